//! Coordinate Reference System handling
//!
//! All CRS strings that reach the service (subset CRS, OUTPUTCRS, dataset
//! projections, GCP projections) go through [`CrsResolver`], which turns them
//! into a comparable [`SpatialReference`] or a typed [`CrsError`]. Callers map
//! the error onto the exception that fits their context.

use std::fmt;

use super::wkt::{gctp_from_proj_name, WktNode};

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Errors raised while resolving or using a coordinate system
#[derive(Debug, Clone, PartialEq)]
pub enum CrsError {
    /// Empty CRS string
    Empty,
    /// EPSG code not present in the definitions database
    UnknownEpsg(u32),
    /// Recognized syntax but unsupported content
    Unsupported(String),
    /// WKT that could not be parsed
    MalformedWkt(String),
    /// The local image CRS has no geographic meaning
    NotGeoreferenced,
    /// Point transformation failed
    Transform(String),
}

impl fmt::Display for CrsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsError::Empty => write!(f, "Empty CRS definition"),
            CrsError::UnknownEpsg(code) => write!(f, "Unknown EPSG code: {}", code),
            CrsError::Unsupported(what) => write!(f, "Unsupported CRS: {}", what),
            CrsError::MalformedWkt(msg) => write!(f, "Malformed WKT: {}", msg),
            CrsError::NotGeoreferenced => write!(f, "Image CRS cannot be transformed"),
            CrsError::Transform(msg) => write!(f, "Coordinate transformation failed: {}", msg),
        }
    }
}

impl std::error::Error for CrsError {}

/// A resolved coordinate reference system
#[derive(Debug, Clone)]
pub enum SpatialReference {
    /// Geographic WGS 84 (EPSG:4326, OGC:CRS84)
    Wgs84,
    /// Any other EPSG code known to the definitions database
    Epsg(u32),
    /// A WKT definition, as reported by the raster library or the projection table
    Wkt { text: String, node: WktNode },
    /// A raw PROJ.4 definition
    Proj4(String),
    /// Pixel space of an image without georeferencing (`OGC:ImageCRS`)
    LocalImage,
}

impl SpatialReference {
    /// EPSG code, when the definition carries one
    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            SpatialReference::Wgs84 => Some(4326),
            SpatialReference::Epsg(code) => Some(*code),
            SpatialReference::Wkt { node, .. } => node.epsg_code(),
            SpatialReference::Proj4(_) | SpatialReference::LocalImage => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SpatialReference::LocalImage)
    }

    pub fn is_geographic(&self) -> bool {
        match self {
            SpatialReference::Wgs84 => true,
            SpatialReference::Wkt { node, .. } => node.is_geographic(),
            SpatialReference::LocalImage => false,
            other => other.proj4().map_or(false, |p| p.contains("+proj=longlat")),
        }
    }

    /// PROJ.4 definition used for proj4rs transformations
    pub fn proj4(&self) -> Result<String, CrsError> {
        match self {
            SpatialReference::Wgs84 => Ok(WGS84_PROJ4.to_string()),
            SpatialReference::Epsg(code) => epsg_proj4(*code)
                .map(str::to_string)
                .ok_or(CrsError::UnknownEpsg(*code)),
            SpatialReference::Wkt { node, .. } => node.to_proj4(),
            SpatialReference::Proj4(text) => Ok(text.clone()),
            SpatialReference::LocalImage => Err(CrsError::NotGeoreferenced),
        }
    }

    /// GCTP projection code of this system
    pub fn gctp_code(&self) -> Option<u32> {
        match self {
            SpatialReference::Wgs84 => Some(0),
            SpatialReference::Wkt { node, .. } => node.gctp_code(),
            SpatialReference::LocalImage => None,
            other => {
                let proj4 = other.proj4().ok()?;
                let name = proj4
                    .split_whitespace()
                    .find_map(|term| term.strip_prefix("+proj="))?;
                gctp_from_proj_name(name)
            }
        }
    }

    /// Argument form understood by the GDAL command line tools (`-t_srs`, `-a_srs`)
    pub fn srs_arg(&self) -> Option<String> {
        match self {
            SpatialReference::Wgs84 => Some("EPSG:4326".to_string()),
            SpatialReference::Epsg(code) => Some(format!("EPSG:{}", code)),
            SpatialReference::Wkt { text, .. } => Some(text.clone()),
            SpatialReference::Proj4(text) => Some(text.clone()),
            SpatialReference::LocalImage => None,
        }
    }

    /// Whether both handles describe the same coordinate system
    pub fn same_as(&self, other: &SpatialReference) -> bool {
        if self.is_local() || other.is_local() {
            return self.is_local() && other.is_local();
        }
        if let (Some(a), Some(b)) = (self.epsg_code(), other.epsg_code()) {
            return a == b;
        }
        match (self.proj4(), other.proj4()) {
            (Ok(a), Ok(b)) => normalize_proj4(&a) == normalize_proj4(&b),
            _ => false,
        }
    }
}

impl PartialEq for SpatialReference {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialReference::Wgs84 => write!(f, "EPSG:4326"),
            SpatialReference::Epsg(code) => write!(f, "EPSG:{}", code),
            SpatialReference::Wkt { node, .. } => {
                let name = node.name().unwrap_or("unnamed");
                match node.authority() {
                    Some(authority) => write!(f, "{} ({})", name, authority),
                    None => write!(f, "{}", name),
                }
            }
            SpatialReference::Proj4(text) => write!(f, "{}", text),
            SpatialReference::LocalImage => write!(f, "OGC:ImageCRS"),
        }
    }
}

fn epsg_proj4(code: u32) -> Option<&'static str> {
    u16::try_from(code)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

fn normalize_proj4(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split_whitespace()
        .filter(|t| *t != "+no_defs" && *t != "+type=crs")
        .map(|t| t.to_ascii_lowercase())
        .collect();
    terms.sort();
    terms
}

/// Central resolver for CRS codes, URNs, URLs and WKT
pub struct CrsResolver;

impl CrsResolver {
    /// Resolve any supported CRS notation
    ///
    /// Accepted forms:
    /// * `EPSG:4326`, plain `4326`
    /// * `urn:ogc:def:crs:EPSG::4326`
    /// * `http://www.opengis.net/def/crs/EPSG/0/4326`
    /// * `OGC:CRS84`, `urn:ogc:def:crs:OGC:1.3:CRS84`, `OGC:ImageCRS`
    /// * WKT (`GEOGCS[...]`, `PROJCS[...]`, `LOCAL_CS[...]`) and PROJ.4 strings
    pub fn resolve(code: &str) -> Result<SpatialReference, CrsError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(CrsError::Empty);
        }
        let upper = trimmed.to_ascii_uppercase();

        if upper.starts_with("GEOGCS") || upper.starts_with("PROJCS") || upper.starts_with("LOCAL_CS") {
            return Self::from_wkt(trimmed);
        }

        if upper.starts_with("+PROJ=") {
            proj4rs::proj::Proj::from_proj_string(trimmed)
                .map_err(|e| CrsError::Unsupported(format!("{}: {:?}", trimmed, e)))?;
            return Ok(SpatialReference::Proj4(trimmed.to_string()));
        }

        if upper.starts_with("OGC:") || upper.starts_with("URN:OGC:DEF:CRS:OGC:") || upper.contains("/DEF/CRS/OGC/") {
            if upper.ends_with(":84") || upper.ends_with("/84") || upper.ends_with("CRS84") {
                return Ok(SpatialReference::Wgs84);
            }
            if upper.ends_with("IMAGECRS") {
                return Ok(SpatialReference::LocalImage);
            }
            return Err(CrsError::Unsupported(trimmed.to_string()));
        }

        let number = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().unwrap_or("")
        } else if upper.contains("/DEF/CRS/EPSG/") {
            upper.trim_end_matches('/').rsplit('/').next().unwrap_or("")
        } else if upper.chars().all(|c| c.is_ascii_digit()) {
            upper.as_str()
        } else {
            return Err(CrsError::Unsupported(trimmed.to_string()));
        };

        let epsg = number
            .trim()
            .parse::<u32>()
            .map_err(|_| CrsError::Unsupported(trimmed.to_string()))?;
        Self::from_epsg(epsg)
    }

    /// Resolve an EPSG code, checking it against the definitions database
    pub fn from_epsg(code: u32) -> Result<SpatialReference, CrsError> {
        if code == 4326 {
            return Ok(SpatialReference::Wgs84);
        }
        match epsg_proj4(code) {
            Some(_) => Ok(SpatialReference::Epsg(code)),
            None => Err(CrsError::UnknownEpsg(code)),
        }
    }

    /// Resolve a WKT definition
    pub fn from_wkt(text: &str) -> Result<SpatialReference, CrsError> {
        let node = WktNode::parse(text)?;
        if node.is_local() {
            return Ok(SpatialReference::LocalImage);
        }
        if node.is_geographic() && node.epsg_code() == Some(4326) {
            return Ok(SpatialReference::Wgs84);
        }
        Ok(SpatialReference::Wkt { text: text.trim().to_string(), node })
    }
}
