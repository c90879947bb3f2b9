//! Coordinate transformation functionality

use std::f64::consts::PI;

use proj4rs::proj::Proj;

use super::bbox::BoundingBox;
use super::crs::{CrsError, SpatialReference};
use super::point::Point;

/// Transformer for converting between coordinate systems
pub struct CoordinateTransformer;

impl CoordinateTransformer {
    /// Earth radius in meters
    const EARTH_RADIUS: f64 = 6378137.0;

    /// Convert from WGS84 (EPSG:4326) to Web Mercator (EPSG:3857)
    pub fn wgs84_to_web_mercator(&self, lon: f64, lat: f64) -> Point {
        // Web Mercator is undefined beyond ~85.05 degrees
        let lat = lat.max(-85.05).min(85.05);

        let x = lon * Self::EARTH_RADIUS * PI / 180.0;
        let y = f64::ln(f64::tan((90.0 + lat) * PI / 360.0)) * Self::EARTH_RADIUS;

        Point::new(x, y)
    }

    /// Convert from Web Mercator (EPSG:3857) to WGS84 (EPSG:4326)
    pub fn web_mercator_to_wgs84(&self, x: f64, y: f64) -> Point {
        let lon = x * 180.0 / (Self::EARTH_RADIUS * PI);
        let lat = 180.0 / PI * (2.0 * f64::atan(f64::exp(y / Self::EARTH_RADIUS)) - PI / 2.0);

        Point::new(lon, lat)
    }

    /// Transform a point between coordinate systems
    pub fn transform_point(&self, point: &Point, from_crs: &SpatialReference, to_crs: &SpatialReference) -> Result<Point, CrsError> {
        if from_crs.is_local() || to_crs.is_local() {
            return Err(CrsError::NotGeoreferenced);
        }
        if from_crs.same_as(to_crs) {
            return Ok(*point);
        }

        let result = match (from_crs.epsg_code(), to_crs.epsg_code()) {
            (Some(4326), Some(3857)) => self.wgs84_to_web_mercator(point.x, point.y),
            (Some(3857), Some(4326)) => self.web_mercator_to_wgs84(point.x, point.y),
            _ => self.transform_with_proj4rs(point, from_crs, to_crs)?,
        };

        if !result.is_finite() {
            return Err(CrsError::Transform(format!(
                "({}, {}) from {} to {} produced a non-finite result",
                point.x, point.y, from_crs, to_crs
            )));
        }
        Ok(result)
    }

    /// Transform a bounding box between coordinate systems
    ///
    /// Only the lower-left and upper-right corners are transformed; the result
    /// is re-ordered so it stays a valid box.
    pub fn transform_bbox(&self, bbox: &BoundingBox, from_crs: &SpatialReference, to_crs: &SpatialReference) -> Result<BoundingBox, CrsError> {
        if from_crs.same_as(to_crs) {
            return Ok(*bbox);
        }

        let lower_left = self.transform_point(&bbox.lower_left(), from_crs, to_crs)?;
        let upper_right = self.transform_point(&bbox.upper_right(), from_crs, to_crs)?;

        Ok(BoundingBox::from_corners(lower_left, upper_right).normalized())
    }

    fn transform_with_proj4rs(&self, point: &Point, from_crs: &SpatialReference, to_crs: &SpatialReference) -> Result<Point, CrsError> {
        let source = Proj::from_proj_string(&from_crs.proj4()?)
            .map_err(|e| CrsError::Transform(format!("Invalid source projection {}: {:?}", from_crs, e)))?;
        let target = Proj::from_proj_string(&to_crs.proj4()?)
            .map_err(|e| CrsError::Transform(format!("Invalid target projection {}: {:?}", to_crs, e)))?;

        // proj4rs works in radians for geographic coordinates
        let mut coords = if from_crs.is_geographic() {
            (point.x.to_radians(), point.y.to_radians(), 0.0)
        } else {
            (point.x, point.y, 0.0)
        };

        proj4rs::transform::transform(&source, &target, &mut coords)
            .map_err(|e| CrsError::Transform(format!("{} to {}: {:?}", from_crs, to_crs, e)))?;

        if to_crs.is_geographic() {
            Ok(Point::new(coords.0.to_degrees(), coords.1.to_degrees()))
        } else {
            Ok(Point::new(coords.0, coords.1))
        }
    }
}
