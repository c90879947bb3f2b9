//! Point structure for representing coordinates

/// A 2D point in some coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate (longitude in geographic systems)
    pub x: f64,
    /// Y coordinate (latitude in geographic systems)
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}
