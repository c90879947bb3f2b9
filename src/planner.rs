//! Output grid planning
//!
//! Predicts the grid the resampler will produce from the native grid, the
//! requested extent and the requested size or resolution.

use std::fmt;

use log::debug;

use crate::adapter::CoverageInfo;
use crate::coordinate::{BoundingBox, CoordinateTransformer, GeoTransform, SpatialReference};
use crate::request::{OutputFormat, OutputShape, SubsetRequest};

/// The grid and encoding of one response
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub crs: SpatialReference,
    pub format: OutputFormat,
    /// Requested extent in the output CRS; the native bounds without a spatial subset
    pub bbox: BoundingBox,
}

impl fmt::Display for OutputPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} in {} ({})",
            self.width, self.height, self.geo_transform, self.crs, self.format.code
        )
    }
}

pub struct OutputGridPlanner;

impl OutputGridPlanner {
    /// Plan the output grid
    ///
    /// `subset_bbox` is the spatial subset already expressed in the output
    /// CRS, or `None` when the request has no spatial subset. Size and
    /// resolution are never both set on a validated request.
    pub fn plan(
        info: &CoverageInfo,
        request: &SubsetRequest,
        subset_bbox: Option<BoundingBox>,
        format: OutputFormat,
    ) -> OutputPlan {
        let crs = match (&request.output_crs, request.has_spatial_subset()) {
            (Some(crs), _) => crs.clone(),
            (None, true) => request.request_crs.clone(),
            (None, false) => info.crs.clone(),
        };

        let native = info.geo_transform.coefficients();
        let native_units = crs.is_local() || info.crs.is_local() || crs.same_as(&info.crs);

        // Pixel counts covering the extent at the native resolution
        let (bbox, (mut width, mut height)) = match subset_bbox {
            Some(bbox) if native_units => (bbox, native_count(&bbox, native)),
            Some(bbox) => {
                let count = CoordinateTransformer
                    .transform_bbox(&bbox, &crs, &info.crs)
                    .map(|b| native_count(&b, native))
                    .unwrap_or_else(|e| {
                        debug!("Subset not expressible in the native CRS: {}", e);
                        info.grid_size()
                    });
                (bbox, count)
            }
            None if native_units => (info.native_bounds(), info.grid_size()),
            None => {
                let bbox = CoordinateTransformer
                    .transform_bbox(&info.native_bounds(), &info.crs, &crs)
                    .unwrap_or_else(|e| {
                        debug!("Native extent not expressible in {}: {}", crs, e);
                        info.native_bounds()
                    });
                (bbox, info.grid_size())
            }
        };

        let mut gt = if subset_bbox.is_none() && native_units {
            native
        } else if native_units {
            [bbox.min_x, native[1], native[2], bbox.max_y, native[4], native[5]]
        } else {
            [
                bbox.min_x,
                bbox.width() / width as f64,
                0.0,
                bbox.max_y,
                0.0,
                -bbox.height() / height as f64,
            ]
        };

        match request.shape {
            OutputShape::Native => {}
            OutputShape::Size { width: w, height: h } => {
                gt[1] = bbox.width() / w as f64;
                gt[5] = -bbox.height() / h as f64;
                width = w;
                height = h;
            }
            OutputShape::Resolution { x, y } => {
                width = count(bbox.width(), x);
                height = count(bbox.height(), y);
                gt[1] = x;
                gt[5] = -y.abs();
            }
        }

        OutputPlan { geo_transform: GeoTransform(gt), width, height, crs, format, bbox }
    }
}

/// Pixels of size `pixel` needed to span `extent`, at least one
fn count(extent: f64, pixel: f64) -> usize {
    if pixel == 0.0 {
        return 1;
    }
    ((extent / pixel.abs()).round() as usize).max(1)
}

fn native_count(bbox: &BoundingBox, native: [f64; 6]) -> (usize, usize) {
    (count(bbox.width(), native[1]), count(bbox.height(), native[5]))
}
