//! Request parsing and validation
//!
//! Turns KVP query strings and XML request documents into validated
//! [`ServiceRequest`]s. Every rule violation returns immediately with the
//! exception code and locator clients expect.

use lazy_static::lazy_static;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::kvp::KvpReader;
use super::{Interpolation, OutputShape, SubsetRequest, TimeRange};
use crate::coordinate::{CrsResolver, SpatialReference};
use crate::errors::{WcsError, WcsResult};

lazy_static! {
    // dim(low[,high[,crs]])
    static ref CLAUSE_REGEX: Regex =
        Regex::new(r"^\s*([A-Za-z_]+)\s*\(([^()]*)\)\s*$").expect("Expression is valid");
}

const DEFAULT_SIZE: usize = 100;
const DEFAULT_RESOLUTION: f64 = 1.0;

/// A parsed protocol request
#[derive(Debug, Clone)]
pub enum ServiceRequest {
    GetCoverage(SubsetRequest),
    DescribeCoverage { coverage_ids: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Time,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        match name.trim().to_ascii_lowercase().as_str() {
            "long" | "lon" | "x" => Some(Axis::X),
            "lat" | "y" => Some(Axis::Y),
            "phenomenontime" | "time" => Some(Axis::Time),
            _ => None,
        }
    }
}

/// `dim(arg, arg, ...)` split into its parts
struct Clause {
    dimension: String,
    args: Vec<String>,
}

impl Clause {
    fn parse(text: &str, locator: &str) -> WcsResult<Clause> {
        let captures = CLAUSE_REGEX
            .captures(text)
            .ok_or_else(|| WcsError::invalid(locator, format!("Malformed {} value: {}", locator, text)))?;
        let args = captures[2]
            .split(',')
            .map(|a| a.trim().trim_matches('"').trim().to_string())
            .collect::<Vec<_>>();
        Ok(Clause { dimension: captures[1].to_string(), args })
    }
}

/// Parser for WCS 2.0 GetCoverage/DescribeCoverage requests
pub struct RequestParser {
    service_access_url: String,
}

impl RequestParser {
    /// Create a parser
    ///
    /// # Arguments
    /// * `service_access_url` - Public URL of the service, prepended to the query for lineage
    pub fn new(service_access_url: &str) -> Self {
        RequestParser { service_access_url: service_access_url.to_string() }
    }

    /// Parse a KVP query string, validating the SERVICE/VERSION/REQUEST envelope
    pub fn parse_kvp(&self, query: &str) -> WcsResult<ServiceRequest> {
        let kvp = KvpReader::parse(query).map_err(|e| WcsError::invalid("WCS-GET-KVP", e))?;

        let service = kvp.get("SERVICE").unwrap_or("");
        if !service.eq_ignore_ascii_case("WCS") {
            return Err(WcsError::missing("Service", "The \"service\" name should be fixed to \"WCS\"."));
        }

        let request = kvp
            .get("REQUEST")
            .ok_or_else(|| WcsError::missing("Request", "Failed to get \"request\" Parameter."))?;

        let version = kvp.get("VERSION").unwrap_or("");
        if !(version == "2.0" || version == "2.0.0") {
            return Err(WcsError::missing("Version", "Requested protocol version should be fixed to \"2.0\"."));
        }

        match request.to_ascii_uppercase().as_str() {
            "GETCOVERAGE" => Ok(ServiceRequest::GetCoverage(self.parse_get_coverage(&kvp, query)?)),
            "DESCRIBECOVERAGE" | "DESCRIBEEOCOVERAGESET" => {
                let ids = kvp
                    .get("COVERAGEID")
                    .ok_or_else(|| WcsError::missing("COVERAGEID", "No Coverage Value."))?;
                let coverage_ids = ids
                    .split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
                Ok(ServiceRequest::DescribeCoverage { coverage_ids })
            }
            _ => Err(WcsError::invalid(
                "WCS-GET-KVP",
                "Passed KVPs could not be parsed based on [OGC 09-147r1] extension.",
            )),
        }
    }

    /// Parse the GetCoverage parameters of a KVP request
    pub fn parse_get_coverage(&self, kvp: &KvpReader, query: &str) -> WcsResult<SubsetRequest> {
        let coverage_id = kvp
            .get("COVERAGEID")
            .ok_or_else(|| WcsError::missing("COVERAGEID", "No Coverage Value."))?;
        let format = kvp
            .get("FORMAT")
            .ok_or_else(|| WcsError::missing("FORMAT", "No FORMAT Value."))?;

        let mut request = SubsetRequest::new(coverage_id, format);
        request.request_url = self.full_url(query);
        request.store = kvp.get("STORE").map_or(false, |v| v.eq_ignore_ascii_case("TRUE"));
        request.multipart = kvp
            .get("MEDIATYPE")
            .map_or(false, |v| v.eq_ignore_ascii_case("multipart/mixed"));

        let sizes = kvp.get_all("SIZE");
        let resolutions = kvp.get_all("RESOLUTION");
        request.shape = match (sizes.is_empty(), resolutions.is_empty()) {
            (false, false) => {
                return Err(WcsError::invalid(
                    "SIZE/RESOLUTION",
                    "SIZE and RESOLUTION cannot be requested together.",
                ))
            }
            (false, true) => parse_size(&sizes)?,
            (true, false) => parse_resolution(&resolutions)?,
            (true, true) => OutputShape::Native,
        };

        if let Some(value) = kvp.get("INTERPOLATION") {
            request.interpolation = Interpolation::from_param(value).ok_or_else(|| {
                WcsError::invalid(
                    "interpolation",
                    "Invalid Parameter Value of interpolation, please select from \"nearest\"(default), \"bilinear\", \"cubic\", \"cubicspline\" and \"lanczos\".",
                )
            })?;
        }

        if let Some(value) = kvp.get("OUTPUTCRS") {
            request.output_crs = Some(
                CrsResolver::resolve(value)
                    .map_err(|_| WcsError::invalid("OUTPUTCRS", "Invalid Parameter Value of OUTPUTCRS."))?,
            );
        }

        if let Some(value) = kvp.get("RANGESUBSET") {
            request.bands = parse_band_list(value)?;
        }

        let mut has_spatial = false;
        let mut subset_crs: Option<SpatialReference> = None;
        for subset in kvp.get_all("SUBSET") {
            let clause = Clause::parse(subset, "SUBSET")?;
            let axis = Axis::from_name(&clause.dimension)
                .ok_or_else(|| WcsError::invalid("GetCoverage", "Unknown subset type."))?;
            match axis {
                Axis::Time => request.time = parse_time(&clause.args),
                Axis::X | Axis::Y => {
                    let (low, high) = parse_trim(&clause.args)?;
                    if axis == Axis::X {
                        request.spatial.x = Some((low, high));
                    } else {
                        request.spatial.y = Some((low, high));
                    }
                    has_spatial = true;
                    if let Some(code) = clause.args.get(2) {
                        let crs = resolve_request_crs(code)?;
                        if subset_crs.as_ref().map_or(false, |named| !named.same_as(&crs)) {
                            return Err(WcsError::invalid("SUBSET", "Spatial subset clauses name different CRSs."));
                        }
                        subset_crs = Some(crs);
                    }
                }
            }
        }

        // A clause without a CRS takes the one another clause named
        if has_spatial {
            request.request_crs = subset_crs.unwrap_or(SpatialReference::Wgs84);
        }

        debug!("Parsed GetCoverage request for {}", request.coverage_id);
        Ok(request)
    }

    /// Parse an XML request document (`wcs:GetCoverage` or `wcs:DescribeCoverage`)
    pub fn parse_xml(&self, xml: &str) -> WcsResult<ServiceRequest> {
        let document = XmlRequest::read(xml)?;

        if !document.service.eq_ignore_ascii_case("WCS") {
            return Err(WcsError::missing("Service", "The \"service\" name should be fixed to \"WCS\"."));
        }
        let version = document.version.as_deref().unwrap_or("2.0");
        if !(version == "2.0" || version == "2.0.0") {
            return Err(WcsError::missing("Version", "Requested protocol version should be fixed to \"2.0\"."));
        }

        match document.root.as_str() {
            "GetCoverage" => Ok(ServiceRequest::GetCoverage(self.subset_from_xml(document)?)),
            "DescribeCoverage" | "DescribeEOCoverageSet" => {
                if document.coverage_ids.is_empty() {
                    return Err(WcsError::missing("COVERAGEID", "No Coverage Value."));
                }
                Ok(ServiceRequest::DescribeCoverage { coverage_ids: document.coverage_ids })
            }
            _ => Err(WcsError::invalid("Request", "Invalid Request.")),
        }
    }

    fn subset_from_xml(&self, document: XmlRequest) -> WcsResult<SubsetRequest> {
        let coverage_id = document
            .coverage_ids
            .first()
            .cloned()
            .ok_or_else(|| WcsError::no_such_coverage("IDENTIFIER", "The value of coverage identifier is null."))?;
        let format = document
            .format
            .clone()
            .ok_or_else(|| WcsError::missing("FORMAT", "No FORMAT Value."))?;

        let mut request = SubsetRequest::new(&coverage_id, &format);
        request.request_url = self.service_access_url.clone();
        request.store = document.store;

        for trim in &document.trims {
            let axis = Axis::from_name(&trim.dimension)
                .ok_or_else(|| WcsError::invalid("GetCoverage", "Unknown subset type."))?;
            match axis {
                Axis::Time => {
                    request.time = TimeRange { begin: trim.low.clone(), end: trim.high.clone() };
                }
                Axis::X | Axis::Y => {
                    let args = [trim.low.clone().unwrap_or_default(), trim.high.clone().unwrap_or_default()];
                    let bounds = parse_trim(&args)?;
                    if axis == Axis::X {
                        request.spatial.x = Some(bounds);
                    } else {
                        request.spatial.y = Some(bounds);
                    }
                    request.request_crs = SpatialReference::Wgs84;
                }
            }
        }

        if let Some(code) = &document.output_crs {
            request.output_crs = Some(
                CrsResolver::resolve(code)
                    .map_err(|_| WcsError::invalid("OUTPUTCRS", "Invalid Parameter Value of OUTPUTCRS."))?,
            );
        }

        Ok(request)
    }

    /// Service URL plus query, with `&` and `"` escaped for embedding in XML attributes
    fn full_url(&self, query: &str) -> String {
        let query = match query.find('?') {
            Some(idx) => &query[idx + 1..],
            None => query,
        };
        format!("{}{}", self.service_access_url, query)
            .replace('&', "%26")
            .replace('"', "%22")
    }
}

fn resolve_request_crs(code: &str) -> WcsResult<SpatialReference> {
    CrsResolver::resolve(code)
        .map_err(|_| WcsError::invalid("subsetRequestCRS", "Invalid Parameter Value of Request CRS."))
}

fn parse_trim(args: &[String]) -> WcsResult<(f64, f64)> {
    let parse = |s: &String| s.parse::<f64>().ok().filter(|v| v.is_finite());
    match args {
        [low, high, ..] => match (parse(low), parse(high)) {
            (Some(low), Some(high)) => Ok((low, high)),
            _ => Err(WcsError::invalid("SUBSET", "Spatial subset bounds must be numbers.")),
        },
        _ => Err(WcsError::invalid("SUBSET", "Spatial subset needs a lower and an upper bound.")),
    }
}

fn parse_time(args: &[String]) -> TimeRange {
    let value = |i: usize| args.get(i).filter(|s| !s.is_empty()).cloned();
    match args.len() {
        1 => TimeRange { begin: value(0), end: None },
        _ => TimeRange { begin: value(0), end: value(1) },
    }
}

fn parse_size(values: &[&str]) -> WcsResult<OutputShape> {
    let mut width = DEFAULT_SIZE as i64;
    let mut height = DEFAULT_SIZE as i64;
    for value in values {
        let clause = Clause::parse(value, "SIZE")?;
        let size = clause.args.first().and_then(|v| v.parse::<i64>().ok()).ok_or_else(|| {
            WcsError::invalid("WIDTH/HEIGHT", "Invalid Parameter Value of WIDTH/HEIGHT.")
        })?;
        match Axis::from_name(&clause.dimension) {
            Some(Axis::X) => width = size,
            Some(Axis::Y) => height = size,
            _ => return Err(WcsError::invalid("SIZE", format!("Unknown size axis: {}", clause.dimension))),
        }
    }
    if width <= 0 || height <= 0 {
        return Err(WcsError::invalid("WIDTH/HEIGHT", "Invalid Parameter Value of WIDTH/HEIGHT."));
    }
    Ok(OutputShape::Size { width: width as usize, height: height as usize })
}

fn parse_resolution(values: &[&str]) -> WcsResult<OutputShape> {
    let mut x = DEFAULT_RESOLUTION;
    let mut y = DEFAULT_RESOLUTION;
    for value in values {
        let clause = Clause::parse(value, "RESOLUTION")?;
        let res = clause
            .args
            .first()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| WcsError::invalid("ResolutionX", "Invalid Parameter Value of Resolution."))?;
        match Axis::from_name(&clause.dimension) {
            Some(Axis::X) => x = res,
            Some(Axis::Y) => y = res,
            _ => {
                return Err(WcsError::invalid(
                    "RESOLUTION",
                    format!("Unknown resolution axis: {}", clause.dimension),
                ))
            }
        }
    }
    if !(x > 0.0 && y > 0.0) || !x.is_finite() || !y.is_finite() {
        return Err(WcsError::invalid("ResolutionX", "Invalid Parameter Value of Resolution."));
    }
    Ok(OutputShape::Resolution { x, y })
}

fn parse_band_list(value: &str) -> WcsResult<Vec<usize>> {
    value
        .split(',')
        .map(|band| {
            band.trim()
                .parse::<usize>()
                .ok()
                .filter(|b| *b > 0)
                .ok_or_else(|| WcsError::invalid("RANGESUBSET", format!("Invalid band index: {}", band.trim())))
        })
        .collect()
}

#[derive(Debug, Default)]
struct TrimDimension {
    dimension: String,
    low: Option<String>,
    high: Option<String>,
}

/// Fields pulled out of an XML request document
#[derive(Debug, Default)]
struct XmlRequest {
    root: String,
    service: String,
    version: Option<String>,
    coverage_ids: Vec<String>,
    trims: Vec<TrimDimension>,
    format: Option<String>,
    output_crs: Option<String>,
    store: bool,
}

impl XmlRequest {
    fn read(xml: &str) -> WcsResult<XmlRequest> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut request = XmlRequest::default();
        let mut path: Vec<String> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| WcsError::invalid("Request", format!("Malformed XML request: {}", e)))?;
            let is_start = matches!(event, Event::Start(_));
            match event {
                Event::Start(e) | Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let mut attributes = Vec::new();
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
                        let value = attr
                            .unescape_value()
                            .map(|v| v.trim().to_string())
                            .unwrap_or_default();
                        attributes.push((key, value));
                    }
                    request.open_element(&name, &path, &attributes);
                    if is_start {
                        path.push(name);
                    }
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| WcsError::invalid("Request", format!("Malformed XML text: {}", err)))?;
                    request.element_text(&path, text.trim());
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if request.root.is_empty() {
            return Err(WcsError::invalid("Request", "Invalid Request."));
        }
        Ok(request)
    }

    fn open_element(&mut self, name: &str, path: &[String], attributes: &[(String, String)]) {
        let attribute = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        if path.is_empty() {
            self.root = name.to_string();
            self.service = attribute("service").unwrap_or_default();
            self.version = attribute("version");
            return;
        }

        match name {
            "trimDimension" | "DimensionTrim" => self.trims.push(TrimDimension::default()),
            "Output" => {
                if let Some(format) = attribute("format") {
                    self.format = Some(format);
                }
                if let Some(store) = attribute("store") {
                    self.store = store.eq_ignore_ascii_case("true");
                }
            }
            _ => {}
        }
    }

    fn element_text(&mut self, path: &[String], text: &str) {
        let current = match path.last() {
            Some(name) => name.as_str(),
            None => return,
        };
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str()).unwrap_or("");

        match (parent, current) {
            (_, "CoverageId") | (_, "CoverageID") => {
                self.coverage_ids.extend(text.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            }
            (_, "Service") if path.len() == 2 => self.service = text.to_string(),
            (_, "Version") if path.len() == 2 => self.version = Some(text.to_string()),
            ("trimDimension", name) | ("DimensionTrim", name) => {
                if let Some(trim) = self.trims.last_mut() {
                    match name {
                        "dimension" | "Dimension" => trim.dimension = text.to_string(),
                        "trimLow" | "TrimLow" => trim.low = Some(text.to_string()),
                        "trimHigh" | "TrimHigh" => trim.high = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
            ("Output", name) => match name.to_ascii_lowercase().as_str() {
                "format" => self.format = Some(text.to_string()),
                "outputcrs" => self.output_crs = Some(text.to_string()),
                "store" => self.store = text.eq_ignore_ascii_case("true"),
                _ => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExceptionCode;

    const BASE: &str = "service=WCS&version=2.0.0&request=GetCoverage";

    fn parse(extra: &str) -> WcsResult<SubsetRequest> {
        let parser = RequestParser::new("http://example.org/wcs?");
        match parser.parse_kvp(&format!("{}&{}", BASE, extra))? {
            ServiceRequest::GetCoverage(request) => Ok(request),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_minimal_request() {
        let request = parse("coverageid=MOD_NDVI&format=image/tiff").unwrap();
        assert_eq!(request.coverage_id, "MOD_NDVI");
        assert_eq!(request.shape, OutputShape::Native);
        assert_eq!(request.interpolation, Interpolation::Nearest);
        assert!(!request.has_spatial_subset());
        assert!(request.request_url.starts_with("http://example.org/wcs?service=WCS%26version"));
    }

    #[test]
    fn test_missing_coverage_and_format() {
        let err = parse("format=image/tiff").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::MissingParameterValue);
        assert_eq!(err.locator(), "COVERAGEID");

        let err = parse("coverageid=A").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::MissingParameterValue);
        assert_eq!(err.locator(), "FORMAT");
    }

    #[test]
    fn test_envelope_rules() {
        let parser = RequestParser::new("");
        let err = parser.parse_kvp("service=WMS&version=2.0&request=GetCoverage").unwrap_err();
        assert_eq!(err.locator(), "Service");
        let err = parser.parse_kvp("service=WCS&version=1.1&request=GetCoverage").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::MissingParameterValue);
        let err = parser.parse_kvp("service=WCS&version=2.0&request=Transaction").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.locator(), "WCS-GET-KVP");

        match parser.parse_kvp("service=WCS&version=2.0&request=DescribeCoverage&coverageid=a,b").unwrap() {
            ServiceRequest::DescribeCoverage { coverage_ids } => assert_eq!(coverage_ids, vec!["a", "b"]),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_subset_aliases_are_equivalent() {
        let a = parse("coverageid=A&format=png&subset=Long(10,20)&subset=Lat(30,40)").unwrap();
        let b = parse("coverageid=A&format=png&subset=x(10,20)&subset=y(30,40)").unwrap();
        let c = parse("coverageid=A&format=png&subset=lon(10,20)&subset=LAT(30,40)").unwrap();
        assert_eq!(a.spatial, b.spatial);
        assert_eq!(b.spatial, c.spatial);
        assert_eq!(a.spatial.x, Some((10.0, 20.0)));
        assert_eq!(a.request_crs, SpatialReference::Wgs84);
    }

    #[test]
    fn test_subset_crs_argument() {
        let request = parse("coverageid=A&format=png&subset=x(0,1000,EPSG:3857)&subset=y(0,1000,EPSG:3857)").unwrap();
        assert_eq!(request.request_crs.epsg_code(), Some(3857));

        let err = parse("coverageid=A&format=png&subset=x(0,1,EPSG:abc)").unwrap_err();
        assert_eq!(err.locator(), "subsetRequestCRS");
    }

    #[test]
    fn test_subset_clause_without_crs_inherits_named_crs() {
        let request = parse("coverageid=A&format=png&subset=x(0,1000000,EPSG:3857)&subset=y(20,30)").unwrap();
        assert_eq!(request.request_crs.epsg_code(), Some(3857));
        assert_eq!(request.spatial.x, Some((0.0, 1_000_000.0)));

        let request = parse("coverageid=A&format=png&subset=y(20,30)&subset=x(0,1000000,EPSG:3857)").unwrap();
        assert_eq!(request.request_crs.epsg_code(), Some(3857));

        let request = parse("coverageid=A&format=png&subset=x(0,10)&subset=y(20,30)").unwrap();
        assert_eq!(request.request_crs, SpatialReference::Wgs84);
    }

    #[test]
    fn test_subset_clauses_with_different_crs() {
        let err = parse("coverageid=A&format=png&subset=x(0,1000000,EPSG:3857)&subset=y(20,30,EPSG:4326)").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.locator(), "SUBSET");

        let request =
            parse("coverageid=A&format=png&subset=x(0,10,EPSG:4326)&subset=y(20,30,urn:ogc:def:crs:EPSG::4326)").unwrap();
        assert_eq!(request.request_crs, SpatialReference::Wgs84);
    }

    #[test]
    fn test_unknown_subset_dimension() {
        let err = parse("coverageid=A&format=png&subset=height(0,10)").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.message(), "Unknown subset type.");
    }

    #[test]
    fn test_time_subset() {
        let request = parse("coverageid=A&format=png&subset=phenomenonTime(\"2010-01-01T00:00:00Z\")").unwrap();
        assert_eq!(request.time.begin.as_deref(), Some("2010-01-01T00:00:00Z"));
        assert_eq!(request.time.end, None);

        let request = parse("coverageid=A&format=png&subset=time(2010-01-01,2010-02-01)").unwrap();
        assert_eq!(request.time.end.as_deref(), Some("2010-02-01"));
        assert!(!request.has_spatial_subset());
    }

    #[test]
    fn test_size_and_resolution() {
        let request = parse("coverageid=A&format=png&size=x(200)").unwrap();
        assert_eq!(request.shape, OutputShape::Size { width: 200, height: 100 });

        let request = parse("coverageid=A&format=png&resolution=lat(0.5)").unwrap();
        assert_eq!(request.shape, OutputShape::Resolution { x: 1.0, y: 0.5 });

        let err = parse("coverageid=A&format=png&size=x(0)").unwrap_err();
        assert_eq!(err.locator(), "WIDTH/HEIGHT");
        let err = parse("coverageid=A&format=png&resolution=x(-1)").unwrap_err();
        assert_eq!(err.locator(), "ResolutionX");
    }

    #[test]
    fn test_size_and_resolution_together_rejected() {
        let err = parse("coverageid=A&format=png&size=x(200)&resolution=y(0.5)").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
    }

    #[test]
    fn test_interpolation_outputcrs_and_flags() {
        let request = parse("coverageid=A&format=png&interpolation=Bilinear&outputcrs=urn:ogc:def:crs:EPSG::3857&store=true&mediatype=multipart/mixed&rangesubset=1,3").unwrap();
        assert_eq!(request.interpolation, Interpolation::Bilinear);
        assert_eq!(request.output_crs.as_ref().and_then(|c| c.epsg_code()), Some(3857));
        assert!(request.store);
        assert!(request.multipart);
        assert_eq!(request.bands, vec![1, 3]);

        let err = parse("coverageid=A&format=png&interpolation=average").unwrap_err();
        assert_eq!(err.locator(), "interpolation");
        let err = parse("coverageid=A&format=png&outputcrs=EPSG:0").unwrap_err();
        assert_eq!(err.locator(), "OUTPUTCRS");
        let err = parse("coverageid=A&format=png&rangesubset=1,x").unwrap_err();
        assert_eq!(err.locator(), "RANGESUBSET");
    }

    #[test]
    fn test_xml_get_coverage() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<wcs:GetCoverage xmlns:wcs="http://www.opengis.net/wcs/2.0" service="WCS" version="2.0.0">
  <wcs:CoverageId>MOD13C1_NDVI</wcs:CoverageId>
  <wcs:trimDimension>
    <wcs:dimension>Long</wcs:dimension>
    <wcs:trimLow>20</wcs:trimLow>
    <wcs:trimHigh>29</wcs:trimHigh>
  </wcs:trimDimension>
  <wcs:trimDimension>
    <wcs:dimension>Lat</wcs:dimension>
    <wcs:trimLow>20</wcs:trimLow>
    <wcs:trimHigh>30</wcs:trimHigh>
  </wcs:trimDimension>
  <wcs:Output format="image/geotiff" store="true">
    <wcs:outputCRS>EPSG:3857</wcs:outputCRS>
  </wcs:Output>
</wcs:GetCoverage>"#;
        let parser = RequestParser::new("http://example.org/wcs?");
        let request = match parser.parse_xml(xml).unwrap() {
            ServiceRequest::GetCoverage(r) => r,
            other => panic!("unexpected request {:?}", other),
        };
        assert_eq!(request.coverage_id, "MOD13C1_NDVI");
        assert_eq!(request.format, "image/geotiff");
        assert_eq!(request.spatial.x, Some((20.0, 29.0)));
        assert_eq!(request.spatial.y, Some((20.0, 30.0)));
        assert!(request.store);
        assert_eq!(request.output_crs.and_then(|c| c.epsg_code()), Some(3857));
    }

    #[test]
    fn test_xml_without_coverage_id() {
        let xml = r#"<GetCoverage service="WCS"><CoverageId></CoverageId><Output format="image/png"/></GetCoverage>"#;
        let err = RequestParser::new("").parse_xml(xml).unwrap_err();
        assert_eq!(err.code(), ExceptionCode::NoSuchCoverage);
    }
}
