//! Earth observation metadata of a delivered coverage
//!
//! The `wcseo:RectifiedDataset` document travels in three places: the
//! `EOMetadataContents` item of the output file, the second part of a
//! multipart response and the metadata box of JPEG 2000 output.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::coordinate::{BoundingBox, GeoTransform, SpatialReference};
use crate::errors::{WcsError, WcsResult};

const EO_NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:eop", "http://www.opengis.net/eop/2.0"),
    ("xmlns:gml", "http://www.opengis.net/gml/3.2"),
    ("xmlns:gmlcov", "http://www.opengis.net/gmlcov/1.0"),
    ("xmlns:om", "http://www.opengis.net/om/2.0"),
    ("xmlns:ows", "http://www.opengis.net/ows/2.0"),
    ("xmlns:swe", "http://www.opengis.net/swe/2.0"),
    ("xmlns:wcseo", "http://www.opengis.net/wcseo/1.0"),
    ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    (
        "xsi:schemaLocation",
        "http://www.opengis.net/wcseo/1.0 http://schemas.opengis.net/wcseo/1.0/wcsEOAll.xsd",
    ),
];

/// Event-level XML writer shared by the response documents
pub(crate) struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    pub(crate) fn new() -> Self {
        XmlBuilder { writer: Writer::new_with_indent(Vec::new(), b' ', 2) }
    }

    pub(crate) fn declaration(&mut self) -> WcsResult<()> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(crate) fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> WcsResult<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.write(Event::Start(element))
    }

    pub(crate) fn end(&mut self, name: &str) -> WcsResult<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> WcsResult<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.write(Event::Empty(element))
    }

    pub(crate) fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> WcsResult<()> {
        self.start(name, attributes)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Already serialized XML, written as is
    pub(crate) fn raw(&mut self, xml: &str) -> WcsResult<()> {
        self.write(Event::Text(BytesText::from_escaped(xml)))
    }

    pub(crate) fn finish(self) -> WcsResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_error)
    }

    fn write(&mut self, event: Event) -> WcsResult<()> {
        self.writer.write_event(event).map_err(xml_error)
    }
}

fn xml_error(e: impl Display) -> WcsError {
    WcsError::no_applicable("EOMetadata", format!("Failed to write XML document: {}", e))
}

/// Range field of one band
#[derive(Debug, Clone, PartialEq)]
pub struct BandDescription {
    pub nil_value: f64,
    pub range: Option<(f64, f64)>,
}

/// Inputs of a `wcseo:RectifiedDataset` document
#[derive(Debug, Clone)]
pub struct EoMetadata {
    /// File name of the delivered artifact; also the `gml:id`
    pub filename: String,
    /// Requested extent
    pub bbox: BoundingBox,
    pub crs: SpatialReference,
    pub grid_size: (usize, usize),
    pub geo_transform: GeoTransform,
    pub file_url: String,
    pub content_type: String,
    /// Prefix of the range field names
    pub field_name: String,
    pub quantity: Option<String>,
    pub bands: Vec<BandDescription>,
    /// Product specific XML carried into `gmlcov:metadata`
    pub extension: Option<String>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub request_url: String,
    pub generated_at: String,
}

impl EoMetadata {
    pub fn render(&self) -> WcsResult<String> {
        let mut xml = XmlBuilder::new();
        let crs_url = crs_url(&self.crs);
        let (axis_labels, uom_labels) = if self.crs.is_geographic() {
            ("lon lat", "deg deg")
        } else {
            ("x y", "m m")
        };

        let mut root: Vec<(&str, &str)> = vec![("gml:id", self.filename.as_str())];
        root.extend_from_slice(EO_NAMESPACES);
        xml.start("wcseo:RectifiedDataset", &root)?;

        xml.start("gml:boundedBy", &[])?;
        xml.start(
            "gml:Envelope",
            &[("axisLabels", axis_labels), ("srsDimension", "2"), ("srsName", crs_url.as_str()), ("uomLabels", uom_labels)],
        )?;
        xml.text_element("gml:lowerCorner", &[], &pair(self.bbox.min_x, self.bbox.min_y))?;
        xml.text_element("gml:upperCorner", &[], &pair(self.bbox.max_x, self.bbox.max_y))?;
        xml.end("gml:Envelope")?;
        xml.end("gml:boundedBy")?;

        self.write_domain_set(&mut xml, &crs_url, axis_labels)?;

        xml.start("gml:rangeSet", &[])?;
        xml.start("gml:File", &[])?;
        xml.empty(
            "gml:rangeParameters",
            &[("xlink:arcrole", "fileReference"), ("xlink:role", self.content_type.as_str())],
        )?;
        xml.text_element("gml:fileReference", &[], &self.file_url)?;
        xml.empty("gml:fileStructure", &[])?;
        xml.text_element("gml:mimeType", &[], &self.content_type)?;
        xml.end("gml:File")?;
        xml.end("gml:rangeSet")?;

        self.write_range_type(&mut xml)?;
        self.write_metadata(&mut xml)?;

        xml.end("wcseo:RectifiedDataset")?;
        xml.finish()
    }

    fn write_domain_set(&self, xml: &mut XmlBuilder, crs_url: &str, axis_labels: &str) -> WcsResult<()> {
        let grid_id = format!("{}_grid", self.filename);
        let origin_id = format!("{}_grid_origin", self.filename);
        let gt = self.geo_transform.coefficients();
        let (width, height) = self.grid_size;

        xml.start("gml:domainSet", &[])?;
        xml.start("gml:RectifiedGrid", &[("dimension", "2"), ("gml:id", grid_id.as_str())])?;
        xml.start("gml:limits", &[])?;
        xml.start("gml:GridEnvelope", &[])?;
        xml.text_element("gml:low", &[], "0 0")?;
        xml.text_element(
            "gml:high",
            &[],
            &format!("{} {}", width.saturating_sub(1), height.saturating_sub(1)),
        )?;
        xml.end("gml:GridEnvelope")?;
        xml.end("gml:limits")?;
        xml.text_element("gml:axisLabels", &[], axis_labels)?;
        xml.start("gml:origin", &[])?;
        xml.start("gml:Point", &[("gml:id", origin_id.as_str()), ("srsName", crs_url)])?;
        xml.text_element("gml:pos", &[], &pair(gt[0], gt[3]))?;
        xml.end("gml:Point")?;
        xml.end("gml:origin")?;
        xml.text_element("gml:offsetVector", &[("srsName", crs_url)], &pair(gt[1], gt[4]))?;
        xml.text_element("gml:offsetVector", &[("srsName", crs_url)], &pair(gt[2], gt[5]))?;
        xml.end("gml:RectifiedGrid")?;
        xml.end("gml:domainSet")
    }

    fn write_range_type(&self, xml: &mut XmlBuilder) -> WcsResult<()> {
        let definition = format!(
            "http://www.opengis.net/def/property/OGC/0/{}",
            self.quantity.as_deref().unwrap_or("Radiance")
        );

        xml.start("gmlcov:rangeType", &[])?;
        xml.start("swe:DataRecord", &[])?;
        for (i, band) in self.bands.iter().enumerate() {
            let name = format!("{}_field_{}", self.field_name, i + 1);
            xml.start("swe:field", &[("name", name.as_str())])?;
            xml.start("swe:Quantity", &[("definition", definition.as_str())])?;
            xml.text_element(
                "swe:description",
                &[],
                &format!("Field {} of {}", i + 1, self.field_name),
            )?;
            xml.text_element("swe:nilValues", &[], &band.nil_value.to_string())?;
            if let Some((min, max)) = band.range {
                xml.start("swe:constraint", &[])?;
                xml.start("swe:AllowedValues", &[])?;
                xml.text_element("swe:min", &[], &min.to_string())?;
                xml.text_element("swe:max", &[], &max.to_string())?;
                xml.end("swe:AllowedValues")?;
                xml.end("swe:constraint")?;
            }
            xml.end("swe:Quantity")?;
            xml.end("swe:field")?;
        }
        xml.end("swe:DataRecord")?;
        xml.end("gmlcov:rangeType")
    }

    fn write_metadata(&self, xml: &mut XmlBuilder) -> WcsResult<()> {
        xml.start("gmlcov:metadata", &[])?;
        if let Some(extension) = &self.extension {
            xml.raw(extension)?;
        }

        if self.begin_time.is_some() || self.end_time.is_some() {
            let observation_id = format!("{}_eo", self.filename);
            let period_id = format!("{}_period", self.filename);
            xml.start("wcseo:EOMetadata", &[])?;
            xml.start("eop:EarthObservation", &[("gml:id", observation_id.as_str())])?;
            xml.start("om:phenomenonTime", &[])?;
            xml.start("gml:TimePeriod", &[("gml:id", period_id.as_str())])?;
            xml.text_element("gml:beginPosition", &[], self.begin_time.as_deref().unwrap_or(""))?;
            xml.text_element("gml:endPosition", &[], self.end_time.as_deref().unwrap_or(""))?;
            xml.end("gml:TimePeriod")?;
            xml.end("om:phenomenonTime")?;
            xml.end("eop:EarthObservation")?;
            xml.end("wcseo:EOMetadata")?;
        }

        xml.start("wcseo:lineage", &[])?;
        xml.start("wcseo:referenceGetCoverage", &[])?;
        xml.empty("ows:Reference", &[("xlink:href", self.request_url.as_str())])?;
        xml.end("wcseo:referenceGetCoverage")?;
        xml.text_element("gml:timePosition", &[], &self.generated_at)?;
        xml.end("wcseo:lineage")?;
        xml.end("gmlcov:metadata")
    }
}

/// `srsName` of a coordinate system
fn crs_url(crs: &SpatialReference) -> String {
    match (crs.epsg_code(), crs) {
        (Some(code), _) => format!("http://www.opengis.net/def/crs/EPSG/0/{}", code),
        (None, SpatialReference::LocalImage) => "http://www.opengis.net/def/crs/OGC/0/ImageCRS".to_string(),
        (None, other) => other.to_string(),
    }
}

fn pair(a: f64, b: f64) -> String {
    format!("{} {}", a, b)
}

/// Reference document returned for stored coverages
pub fn coverages_reference(file_url: &str) -> WcsResult<String> {
    let mut xml = XmlBuilder::new();
    xml.declaration()?;
    xml.start(
        "Coverages",
        &[
            ("xmlns", "http://www.opengis.net/wcs/1.0"),
            ("xmlns:ows", "http://www.opengis.net/ows"),
            ("xmlns:owcs", "http://www.opengis.net/wcs/1.1/ows"),
            ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("xsi:schemaLocation", "http://schemas.opengis.net/ows/1.1.0 ../owsCoverages.xsd"),
        ],
    )?;
    xml.start("Coverage", &[])?;
    xml.text_element("Abstract", &[], "Coverage created from GetCoverage operation request to a WCS")?;
    xml.empty(
        "Reference",
        &[("xlink:href", file_url), ("xlink:role", "urn:ogc:def:role:WCS:1.1:coverage")],
    )?;
    xml.end("Coverage")?;
    xml.end("Coverages")?;
    xml.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> EoMetadata {
        EoMetadata {
            filename: "MOD13C1_NDVI.tif".to_string(),
            bbox: BoundingBox::new(10.0, 30.0, 20.0, 40.0),
            crs: SpatialReference::Wgs84,
            grid_size: (200, 100),
            geo_transform: GeoTransform([10.0, 0.05, 0.0, 40.0, 0.0, -0.1]),
            file_url: "http://localhost/output/MOD13C1_NDVI.tif".to_string(),
            content_type: "image/tiff".to_string(),
            field_name: "NDVI".to_string(),
            quantity: Some("NDVI".to_string()),
            bands: vec![
                BandDescription { nil_value: -3000.0, range: Some((-2000.0, 10000.0)) },
                BandDescription { nil_value: -3000.0, range: None },
            ],
            extension: None,
            begin_time: Some("2010-10-16T00:00:00Z".to_string()),
            end_time: None,
            request_url: "http://localhost/cgi-bin/eowcs?service=WCS&request=GetCoverage".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_rectified_dataset_document() {
        let xml = document().render().unwrap();
        assert!(xml.starts_with("<wcseo:RectifiedDataset gml:id=\"MOD13C1_NDVI.tif\""));
        assert!(xml.contains("srsName=\"http://www.opengis.net/def/crs/EPSG/0/4326\""));
        assert!(xml.contains("<gml:lowerCorner>10 30</gml:lowerCorner>"));
        assert!(xml.contains("<gml:high>199 99</gml:high>"));
        assert!(xml.contains("<gml:pos>10 40</gml:pos>"));
        assert!(xml.contains(">0 -0.1</gml:offsetVector>"));
        assert!(xml.contains("<swe:field name=\"NDVI_field_2\">"));
        assert_eq!(xml.matches("<swe:AllowedValues>").count(), 1);
        assert!(xml.contains("<gml:beginPosition>2010-10-16T00:00:00Z</gml:beginPosition>"));
        assert!(xml.contains("xlink:href=\"http://localhost/cgi-bin/eowcs?service=WCS&amp;request=GetCoverage\""));
        assert!(xml.trim_end().ends_with("</wcseo:RectifiedDataset>"));
    }

    #[test]
    fn test_extension_is_embedded_verbatim() {
        let mut doc = document();
        doc.extension = Some("<headers><field name=\"FHDR\" value=\"NITF02.10\" /></headers>".to_string());
        doc.begin_time = None;
        let xml = doc.render().unwrap();
        assert!(xml.contains("<headers><field name=\"FHDR\" value=\"NITF02.10\" /></headers>"));
        assert!(!xml.contains("wcseo:EOMetadata"));
    }

    #[test]
    fn test_coverages_reference() {
        let xml = coverages_reference("http://localhost/output/a.tif").unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xlink:href=\"http://localhost/output/a.tif\""));
        assert!(xml.contains("urn:ogc:def:role:WCS:1.1:coverage"));
    }
}
