//! Raster I/O capability
//!
//! The service never decodes pixels itself. Format adapters inspect granules
//! through [`RasterDataset`] and stage intermediate copies through
//! [`RasterIo::create_copy`]. Two implementations ship with the crate: the
//! GDAL command line tools and an in-memory catalog used by tests.

pub mod gdal_cli;
pub mod memory;

use std::path::PathBuf;
use std::time::Duration;

pub use gdal_cli::GdalCliRasterIo;
pub use memory::{MemoryDataset, MemoryRasterIo};

use crate::coordinate::{BoundingBox, GeoTransform};
use crate::errors::WcsResult;

/// How swath geolocation arrays are exposed (`GEOL_AS_GCPS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationMode {
    /// Every geolocation sample becomes a GCP; used for extraction
    Full,
    /// A thinned GCP grid; enough for describing a coverage
    Partial,
}

impl GeolocationMode {
    pub fn config_value(&self) -> &'static str {
        match self {
            GeolocationMode::Full => "FULL",
            GeolocationMode::Partial => "PARTIAL",
        }
    }
}

/// A ground control point tying a pixel position to a world coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundControlPoint {
    pub pixel: f64,
    pub line: f64,
    pub x: f64,
    pub y: f64,
}

/// Read access to an opened raster
pub trait RasterDataset {
    /// Identifier the dataset was opened with
    fn identifier(&self) -> &str;
    fn driver_name(&self) -> &str;
    /// (width, height) in pixels
    fn raster_size(&self) -> (usize, usize);
    fn band_count(&self) -> usize;
    /// No-data value of a 1-based band
    fn no_data_value(&self, band: usize) -> Option<f64>;
    fn band_metadata(&self, band: usize) -> Vec<(String, String)>;
    /// (min, max) of a 1-based band, when known
    fn band_range(&self, band: usize) -> Option<(f64, f64)>;
    fn geo_transform(&self) -> Option<GeoTransform>;
    /// Projection WKT, `None` when the dataset has none
    fn projection(&self) -> Option<String>;
    /// Metadata items of a domain; `""` is the default domain
    fn metadata(&self, domain: &str) -> Vec<(String, String)>;
    fn gcps(&self) -> Vec<GroundControlPoint>;
    fn gcp_projection(&self) -> Option<String>;

    /// A single item of the default metadata domain
    fn metadata_item(&self, key: &str) -> Option<String> {
        self.metadata("")
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }
}

/// Parameters of a dataset copy
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub source: String,
    pub destination: PathBuf,
    pub driver: String,
    /// 1-based bands to keep; empty keeps all
    pub bands: Vec<usize>,
    pub no_data: Option<f64>,
    /// CRS assigned to the copy
    pub srs: Option<String>,
    /// Georeferenced extent assigned to the copy
    pub bounds: Option<BoundingBox>,
    /// Default-domain metadata written to the copy
    pub metadata: Vec<(String, String)>,
    /// Whether source metadata is carried over before `metadata` is applied
    pub copy_source_metadata: bool,
    pub geolocation: GeolocationMode,
    pub timeout: Duration,
}

impl CopyRequest {
    pub fn new(source: &str, destination: PathBuf, driver: &str, timeout: Duration) -> Self {
        CopyRequest {
            source: source.to_string(),
            destination,
            driver: driver.to_string(),
            bands: Vec::new(),
            no_data: None,
            srs: None,
            bounds: None,
            metadata: Vec::new(),
            copy_source_metadata: true,
            geolocation: GeolocationMode::Full,
            timeout,
        }
    }
}

/// Opens rasters and writes copies of them
pub trait RasterIo {
    fn open(&self, identifier: &str, mode: GeolocationMode) -> WcsResult<Box<dyn RasterDataset>>;
    fn create_copy(&self, request: &CopyRequest) -> WcsResult<()>;
}
