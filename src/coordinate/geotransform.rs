//! Affine pixel-to-world transform

use super::bbox::BoundingBox;

/// The six GDAL-style affine coefficients
///
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`.
/// Rotation terms are kept as given; the pipeline itself only produces
/// north-up transforms with a negative `c[5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Pixel space: `[0, 1, 0, 0, 0, 1]`
    pub fn identity() -> Self {
        GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// North-up transform covering `bbox` with the given pixel counts
    pub fn from_bounds(bbox: &BoundingBox, x_size: usize, y_size: usize) -> Self {
        let res_x = bbox.width() / x_size.max(1) as f64;
        let res_y = bbox.height() / y_size.max(1) as f64;
        GeoTransform([bbox.min_x, res_x, 0.0, bbox.max_y, 0.0, -res_y])
    }

    /// North-up transform anchored at the upper-left corner with square pixels
    pub fn north_up(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        GeoTransform([origin_x, res_x, 0.0, origin_y, 0.0, -res_y.abs()])
    }

    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    pub fn is_identity(&self) -> bool {
        *self == GeoTransform::identity()
    }

    /// Extent covered by an image of the given size (rotation ignored)
    pub fn bounds(&self, x_size: usize, y_size: usize) -> BoundingBox {
        let far_x = self.origin_x() + x_size as f64 * self.pixel_width();
        let far_y = self.origin_y() + y_size as f64 * self.pixel_height();
        BoundingBox::new(self.origin_x(), far_y, far_x, self.origin_y()).normalized()
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }
}

impl std::fmt::Display for GeoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = self.0;
        write!(f, "[{}, {}, {}, {}, {}, {}]", c[0], c[1], c[2], c[3], c[4], c[5])
    }
}
