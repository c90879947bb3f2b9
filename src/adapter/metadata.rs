//! Coverage metadata harvested from granule headers

use quick_xml::escape::escape;

use super::identifier::CoverageFamily;
use crate::raster::RasterDataset;

/// NITF file header fields; everything else is a subheader field
const NITF_FILE_HEADER_FIELDS: &[&str] = &[
    "FHDR", "FVER", "CLEVEL", "STYPE", "OSTAID", "FDT", "FTITLE", "FSCLAS", "FSCLSY", "FSCODE", "FSCTLH",
    "FSREL", "FSDCTP", "FSDCDT", "FSDCXM", "FSDG", "FSDGDT", "FSCLTX", "FSCATP", "FSCAUT", "FSCRSN", "FSSRDT",
    "FSCTLN", "FSCOP", "FSCPYS", "ENCRYP", "FBKGC", "ONAME", "OPHONE", "FL", "HL", "NUMI", "LISHn", "LIn",
    "NUMS", "LSSHn", "LSn", "NUMX", "NUMT", "LTSHn", "LTn", "NUMDES", "LDSHn", "LDn", "NUMRES", "LRESHn",
    "LREn", "UDHDL", "UDHOFL", "UDHD", "XHDL", "XHDLOFL", "XHD",
];

/// Descriptive metadata of a coverage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageMetadata {
    /// Ordered `key=value` items; the product description comes first
    pub items: Vec<(String, String)>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    /// Unit of measure of the range values
    pub quantity: Option<String>,
    /// Space separated `min max`
    pub allowed_range: Option<String>,
    pub archive_time: Option<String>,
    pub platform: Option<String>,
    pub instrument: Option<String>,
    pub sensor: Option<String>,
    /// XML fragment carried into the EO metadata extension
    pub extension: Option<String>,
}

impl CoverageMetadata {
    fn described(family: CoverageFamily) -> Self {
        CoverageMetadata {
            items: vec![("Product_Description".to_string(), family.product_description().to_string())],
            ..Default::default()
        }
    }

    pub fn item(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// (min, max) parsed from the allowed range
    pub fn allowed_bounds(&self) -> Option<(f64, f64)> {
        let range = self.allowed_range.as_deref()?;
        let mut values = range
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<f64>().ok());
        Some((values.next()?, values.next()?))
    }
}

/// HDF-EOS2 grids and swaths: ECS core metadata from the default domain
pub fn hdf_eos2(family: CoverageFamily, dataset: &dyn RasterDataset) -> CoverageMetadata {
    let mut md = CoverageMetadata::described(family);
    let (mut begin_date, mut end_date, mut begin_time, mut end_time) = (None, None, None, None);

    for (key, value) in dataset.metadata("") {
        match key.to_ascii_uppercase().as_str() {
            "RANGEBEGINNINGDATE" => begin_date = Some(value.clone()),
            "RANGEENDINGDATE" => end_date = Some(value.clone()),
            "RANGEBEGINNINGTIME" => begin_time = Some(value.clone()),
            "RANGEENDINGTIME" => end_time = Some(value.clone()),
            "UNITS" => md.quantity = Some(value.clone()),
            "VALID_RANGE" => md.allowed_range = Some(value.replace(',', " ")),
            "PRODUCTIONDATETIME" => md.archive_time = Some(value.clone()),
            "ASSOCIATEDPLATFORMSHORTNAME" => md.platform = Some(value.clone()),
            "ASSOCIATEDINSTRUMENTSHORTNAME" => md.instrument = Some(value.clone()),
            "ASSOCIATEDSENSORSHORTNAME" => md.sensor = Some(value.clone()),
            _ => {}
        }
        md.items.push((key, value));
    }

    md.begin_time = compose_time(begin_date, begin_time);
    md.end_time = compose_time(end_date, end_time);
    md
}

/// HDF-EOS5 grids and swaths (OMI products on Aura)
///
/// Returns the metadata and the `_FillValue` of the first band, if any.
pub fn hdf_eos5(family: CoverageFamily, dataset: &dyn RasterDataset) -> (CoverageMetadata, Option<f64>) {
    let mut md = CoverageMetadata::described(family);
    let mut fill_value = None;

    for (key, value) in dataset.metadata("") {
        if key.eq_ignore_ascii_case("FILE_ATTRIBUTES:InstrumentName") {
            md.instrument = Some(value.clone());
        }
        md.items.push((key, value));
    }

    for (key, value) in dataset.band_metadata(1) {
        let lower = key.to_ascii_lowercase();
        if lower.contains("_fillvalue") {
            fill_value = value.trim().parse::<f64>().ok();
        } else if lower.contains("units") {
            md.quantity = Some(value.clone());
        } else if lower.contains("validrange") {
            md.allowed_range = Some(value.replace(',', " "));
        }
        md.items.push((key, value));
    }

    md.platform = Some("Aura".to_string());
    md.sensor = Some("CCD Ultra Violet".to_string());
    (md, fill_value)
}

/// TRMM 3B42 daily precipitation
pub fn trmm() -> CoverageMetadata {
    let mut md = CoverageMetadata::described(CoverageFamily::Trmm);
    md.items.push(("unit".to_string(), "mm".to_string()));
    md.items.push(("FillValue".to_string(), "-9999.9".to_string()));
    md.quantity = Some("mm".to_string());
    md.allowed_range = Some("0 5000".to_string());
    md.platform = Some("TRMM".to_string());
    md.instrument = Some("Precipitation Radar".to_string());
    md.sensor = Some("Precipitation Radar".to_string());
    md
}

/// GOES imagery: the default domain as is
pub fn goes(dataset: &dyn RasterDataset) -> CoverageMetadata {
    let mut md = CoverageMetadata::described(CoverageFamily::Goes);
    md.items.extend(dataset.metadata(""));
    md
}

/// NITF: header and subheader documents combined with each TRE document
pub fn nitf(dataset: &dyn RasterDataset) -> CoverageMetadata {
    let mut md = CoverageMetadata::described(CoverageFamily::Nitf);
    let mut headers = String::from("<headers>");
    let mut subheaders = String::from("<subheaders>");

    for (key, value) in dataset.metadata("") {
        let name = key.strip_prefix("NITF_").unwrap_or(&key);
        if NITF_FILE_HEADER_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name)) {
            let value = if name.eq_ignore_ascii_case("FBKGC") {
                hex_color(&value).unwrap_or(value)
            } else {
                value
            };
            headers.push_str(&field_element(name, &value));
        } else {
            subheaders.push_str(&field_element(name, &value));
        }
    }
    headers.push_str("</headers>");
    subheaders.push_str("</subheaders>");

    let base = format!("{}{}", headers, subheaders);
    let tres = dataset.metadata("xml:TRE");
    for (_, tre) in &tres {
        md.items.push(("NITF_METADATA".to_string(), format!("{}{}", base, tre)));
    }
    md.extension = Some(match tres.first() {
        Some((_, tre)) => format!("{}{}", base, tre),
        None => base,
    });
    md
}

fn field_element(name: &str, value: &str) -> String {
    format!("<field name=\"{}\" value=\"{}\" />", escape(name), escape(value))
}

/// `0,127,0` as `007F00`
fn hex_color(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let mut hex = String::with_capacity(6);
    for part in parts {
        let channel = part.trim().parse::<u8>().ok()?;
        hex.push_str(&format!("{:02X}", channel));
    }
    Some(hex)
}

fn compose_time(date: Option<String>, time: Option<String>) -> Option<String> {
    let date = date.filter(|d| !d.trim().is_empty())?;
    let time = time.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "00:00:00".to_string());
    Some(format!("{}T{}Z", date.trim(), time.trim().trim_end_matches('Z')))
}
