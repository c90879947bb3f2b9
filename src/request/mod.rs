//! Coverage request model and wire-format parsers
//!
//! Both the KVP (HTTP GET) and XML (HTTP POST) forms of a request end up as
//! the same validated [`SubsetRequest`].

pub mod format;
pub mod kvp;
pub mod parser;

pub use format::OutputFormat;
pub use kvp::KvpReader;
pub use parser::{RequestParser, ServiceRequest};

use crate::coordinate::{BoundingBox, SpatialReference};

/// Resampling kernel requested through INTERPOLATION
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
}

impl Interpolation {
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Some(Interpolation::Nearest),
            "bilinear" => Some(Interpolation::Bilinear),
            "cubic" => Some(Interpolation::Cubic),
            "cubicspline" => Some(Interpolation::CubicSpline),
            "lanczos" => Some(Interpolation::Lanczos),
            _ => None,
        }
    }

    /// Name of the kernel on the resampler command line
    pub fn resampler_name(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "near",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Cubic => "cubic",
            Interpolation::CubicSpline => "cubicspline",
            Interpolation::Lanczos => "lanczos",
        }
    }
}

/// Requested output grid shape; pixel size and resolution are mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputShape {
    /// Keep the native pixel size
    #[default]
    Native,
    /// Output pixel counts
    Size { width: usize, height: usize },
    /// Output pixel size in CRS units
    Resolution { x: f64, y: f64 },
}

/// Requested time interval; either end may be open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub begin: Option<String>,
    pub end: Option<String>,
}

impl TimeRange {
    pub fn is_empty(&self) -> bool {
        self.begin.is_none() && self.end.is_none()
    }
}

/// Spatial trims requested per axis, in the request CRS
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpatialSubset {
    pub x: Option<(f64, f64)>,
    pub y: Option<(f64, f64)>,
}

impl SpatialSubset {
    pub fn is_set(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// Request box, with axes left untrimmed taken from `native`
    pub fn resolve(&self, native: &BoundingBox) -> BoundingBox {
        let (min_x, max_x) = self.x.unwrap_or((native.min_x, native.max_x));
        let (min_y, max_y) = self.y.unwrap_or((native.min_y, native.max_y));
        BoundingBox::new(min_x, min_y, max_x, max_y).normalized()
    }
}

/// A validated GetCoverage request
#[derive(Debug, Clone)]
pub struct SubsetRequest {
    pub coverage_id: String,
    /// Format as requested, e.g. `image/tiff`
    pub format: String,
    /// CRS of the spatial subset (EPSG:4326 unless the SUBSET clause names one)
    pub request_crs: SpatialReference,
    pub spatial: SpatialSubset,
    pub time: TimeRange,
    /// 1-based band indices; empty means all bands
    pub bands: Vec<usize>,
    pub shape: OutputShape,
    pub output_crs: Option<SpatialReference>,
    pub interpolation: Interpolation,
    pub store: bool,
    pub multipart: bool,
    /// Full request URL recorded in the lineage of the EO metadata
    pub request_url: String,
}

impl SubsetRequest {
    /// A request for the whole coverage in its native grid
    pub fn new(coverage_id: &str, format: &str) -> Self {
        SubsetRequest {
            coverage_id: coverage_id.to_string(),
            format: format.to_string(),
            request_crs: SpatialReference::Wgs84,
            spatial: SpatialSubset::default(),
            time: TimeRange::default(),
            bands: Vec::new(),
            shape: OutputShape::Native,
            output_crs: None,
            interpolation: Interpolation::Nearest,
            store: false,
            multipart: false,
            request_url: String::new(),
        }
    }

    pub fn has_spatial_subset(&self) -> bool {
        self.spatial.is_set()
    }

    /// CRS of the delivered grid: OUTPUTCRS when given, else the request CRS
    pub fn target_crs(&self) -> &SpatialReference {
        self.output_crs.as_ref().unwrap_or(&self.request_crs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_names() {
        assert_eq!(Interpolation::from_param("NEAREST").unwrap().resampler_name(), "near");
        assert_eq!(Interpolation::from_param("cubicspline"), Some(Interpolation::CubicSpline));
        assert_eq!(Interpolation::from_param("average"), None);
    }

    #[test]
    fn test_partial_subset_uses_native_axis() {
        let subset = SpatialSubset { x: Some((20.0, 10.0)), y: None };
        let native = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        assert_eq!(subset.resolve(&native), BoundingBox::new(10.0, -90.0, 20.0, 90.0));
    }
}
