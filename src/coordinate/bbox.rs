//! Bounding box structure for request and coverage extents

use super::point::Point;

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    /// Build a box from its lower-left and upper-right corners
    pub fn from_corners(lower_left: Point, upper_right: Point) -> Self {
        BoundingBox::new(lower_left.x, lower_left.y, upper_right.x, upper_right.y)
    }

    /// Build a box from west/east/south/north edges, swapping edges given in the wrong order
    ///
    /// Granules crossing the antimeridian report west > east; the swap keeps
    /// `min_x <= max_x` at the cost of describing the complementary longitude span.
    pub fn from_edges(west: f64, east: f64, south: f64, north: f64) -> Self {
        BoundingBox::new(west, south, east, north).normalized()
    }

    /// Copy with minimum and maximum ordered on both axes
    pub fn normalized(&self) -> Self {
        BoundingBox {
            min_x: self.min_x.min(self.max_x),
            max_x: self.min_x.max(self.max_x),
            min_y: self.min_y.min(self.max_y),
            max_y: self.min_y.max(self.max_y),
        }
    }

    pub fn lower_left(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn upper_right(&self) -> Point {
        Point::new(self.max_x, self.max_y)
    }

    /// Get the width of the bounding box
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
