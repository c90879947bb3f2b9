pub mod adapter;
pub mod api;
pub mod commands;
pub mod config;
pub mod coordinate;
pub mod errors;
pub mod external;
pub mod pipeline;
pub mod planner;
pub mod raster;
pub mod request;
pub mod utils;

pub use crate::api::EoWcs;

pub use adapter::{CoverageDispatcher, CoverageInfo, FormatAdapter};
pub use config::{DatasetCatalog, ServiceConfig};
pub use coordinate::{BoundingBox, GeoTransform, Point, SpatialReference};
pub use errors::{WcsError, WcsResult};
pub use pipeline::{Extraction, OutputTarget};
pub use request::{RequestParser, ServiceRequest, SubsetRequest};
