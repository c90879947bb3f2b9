//! External resampling and compression capabilities
//!
//! Warping and JPEG 2000 encoding are delegated to command line tools. The
//! pipeline only talks to the [`Resampler`] and [`Compressor`] traits, so the
//! tools can be swapped for in-memory doubles in tests.

pub mod command;
pub mod gdalwarp;
pub mod kakadu;

use std::path::PathBuf;
use std::time::Duration;

pub use command::{CommandOutput, CommandRunner, ToolError};
pub use gdalwarp::GdalWarp;
pub use kakadu::KakaduCompressor;

use crate::coordinate::BoundingBox;
use crate::errors::WcsResult;
use crate::request::{Interpolation, OutputShape};

/// One resampling invocation
#[derive(Debug, Clone)]
pub struct ResampleJob {
    /// Raster library identifier or path of the source
    pub source: String,
    pub destination: PathBuf,
    /// Target CRS in `-t_srs` notation
    pub target_srs: Option<String>,
    /// Target extent in the target CRS
    pub extent: Option<BoundingBox>,
    pub shape: OutputShape,
    pub no_data: f64,
    pub interpolation: Interpolation,
    pub timeout: Duration,
}

/// Warps a raster onto a new grid
pub trait Resampler {
    fn resample(&self, job: &ResampleJob) -> WcsResult<()>;
}

/// One compression invocation
#[derive(Debug, Clone)]
pub struct CompressJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Metadata box file embedded into the codestream container
    pub side_file: Option<PathBuf>,
    /// Encoder parameters such as `Creversible=yes`
    pub parameters: Vec<String>,
    pub timeout: Duration,
}

/// Encodes a resampled GeoTIFF into a compressed delivery format
pub trait Compressor {
    fn compress(&self, job: &CompressJob) -> WcsResult<()>;
}
