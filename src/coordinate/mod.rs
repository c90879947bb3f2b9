//! Coordinate handling for geospatial data
//!
//! This module provides CRS resolution, the projection table used for
//! HDF-EOS grids, bounding boxes, geotransforms and point transformation.

mod bbox;
mod crs;
mod geotransform;
mod point;
mod projections;
mod transform;
pub mod wkt;

// Re-export key types
pub use self::bbox::BoundingBox;
pub use self::crs::{CrsError, CrsResolver, SpatialReference};
pub use self::geotransform::GeoTransform;
pub use self::point::Point;
pub use self::projections::{ProjectionDefinition, ProjectionTable};
pub use self::transform::CoordinateTransformer;
