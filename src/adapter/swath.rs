//! HDF-EOS2 and HDF-EOS5 swaths
//!
//! Swaths are irregular grids located by geolocation arrays, which the raster
//! library exposes as ground control points. The geotransform resolved here
//! only describes the rectified grid the resampler will produce.

use log::{debug, warn};

use super::identifier::CoverageIdentifier;
use super::metadata;
use super::{
    band_ranges, bounding_tags, check_geo_transform, library_crs, missing_value, open_native, CoverageInfo,
    CoverageSubtype,
};
use crate::coordinate::{BoundingBox, CoordinateTransformer, CrsResolver, GeoTransform, Point, SpatialReference};
use crate::errors::{WcsError, WcsResult};
use crate::raster::{GeolocationMode, GroundControlPoint, RasterDataset, RasterIo};

/// Swath products
pub struct SwathAdapter {
    pub(crate) info: CoverageInfo,
    pub(crate) dataset: Box<dyn RasterDataset>,
}

/// Outcome of geotransform resolution
#[derive(Debug, Clone, PartialEq)]
struct SwathGrid {
    geo_transform: GeoTransform,
    rectified_size: Option<(usize, usize)>,
    georeferenced: bool,
    derived: bool,
}

impl SwathAdapter {
    pub fn open(io: &dyn RasterIo, identifier: CoverageIdentifier, mode: GeolocationMode) -> WcsResult<Self> {
        let dataset = open_native(io, &identifier, mode)?;
        let family = identifier.family;

        let (metadata, fill_value) = if family.is_hdf_eos5() {
            metadata::hdf_eos5(family, dataset.as_ref())
        } else {
            (metadata::hdf_eos2(family, dataset.as_ref()), None)
        };
        let missing_value = fill_value.unwrap_or_else(|| missing_value(dataset.as_ref(), family));

        let crs = Self::resolve_crs(dataset.as_ref())?;
        let grid = Self::resolve_grid(dataset.as_ref(), &crs)?;
        if !grid.georeferenced {
            warn!("Swath {} has no usable geolocation; using pixel coordinates", identifier.dataset);
        }

        let info = CoverageInfo {
            driver: dataset.driver_name().to_string(),
            crs,
            geo_transform: grid.geo_transform,
            georeferenced: grid.georeferenced,
            derived_georeferencing: grid.derived,
            raster_size: dataset.raster_size(),
            rectified_size: grid.rectified_size,
            band_count: dataset.band_count(),
            missing_value,
            subtype: CoverageSubtype::Referenceable,
            metadata,
            band_ranges: band_ranges(dataset.as_ref()),
            identifier,
        };
        Ok(SwathAdapter { info, dataset })
    }

    /// Library CRS, else the CRS of the geolocation
    fn resolve_crs(dataset: &dyn RasterDataset) -> WcsResult<SpatialReference> {
        if let Some(crs) = library_crs(dataset) {
            return Ok(crs);
        }
        if let Some(text) = dataset.gcp_projection().filter(|t| !t.trim().is_empty()) {
            return Ok(CrsResolver::resolve(&text).unwrap_or_else(|e| {
                debug!("GCP projection not understood ({}); assuming WGS 84", e);
                SpatialReference::Wgs84
            }));
        }
        if !dataset.gcps().is_empty() {
            return Ok(SpatialReference::Wgs84);
        }
        Err(WcsError::no_applicable("SetNativeCRS", "Failed to generate CRS for coverage."))
    }

    fn resolve_grid(dataset: &dyn RasterDataset, native_crs: &SpatialReference) -> WcsResult<SwathGrid> {
        if let Some(gt) = dataset.geo_transform() {
            return Ok(SwathGrid {
                geo_transform: check_geo_transform(gt)?,
                rectified_size: None,
                georeferenced: true,
                derived: false,
            });
        }

        let (width, height) = dataset.raster_size();
        if let Some(bbox) = bounding_tags(dataset) {
            let resolution = (bbox.width() / width as f64).min(bbox.height() / height as f64);
            return rectified(&bbox, resolution);
        }

        let gcps = dataset.gcps();
        if gcps.len() < 2 {
            return Ok(SwathGrid {
                geo_transform: GeoTransform::identity(),
                rectified_size: None,
                georeferenced: false,
                derived: false,
            });
        }

        let gcp_crs = dataset
            .gcp_projection()
            .filter(|t| !t.trim().is_empty())
            .and_then(|t| CrsResolver::resolve(&t).ok())
            .unwrap_or_else(|| native_crs.clone());
        let extent = CoordinateTransformer
            .transform_bbox(&gcp_extent(&gcps), &gcp_crs, native_crs)
            .map_err(|e| {
                WcsError::no_applicable(
                    "SetGeoTransform",
                    format!("Failed to transform the swath extent to the native CRS: {}", e),
                )
            })?;
        let resolution = (extent.width() / width as f64).min(extent.height() / height as f64);
        rectified(&extent, resolution)
    }
}

/// Corner extent of the control points
fn gcp_extent(gcps: &[GroundControlPoint]) -> BoundingBox {
    let lower_left = gcps.iter().fold(Point::new(f64::INFINITY, f64::INFINITY), |p, g| {
        Point::new(p.x.min(g.x), p.y.min(g.y))
    });
    let upper_right = gcps.iter().fold(Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY), |p, g| {
        Point::new(p.x.max(g.x), p.y.max(g.y))
    });
    BoundingBox::from_corners(lower_left, upper_right)
}

/// Square-pixel grid covering `bbox`
fn rectified(bbox: &BoundingBox, resolution: f64) -> WcsResult<SwathGrid> {
    let gt = check_geo_transform(GeoTransform::north_up(bbox.min_x, bbox.max_y, resolution, resolution))?;
    let size = (
        (bbox.width() / resolution) as usize + 1,
        (bbox.height() / resolution) as usize + 1,
    );
    Ok(SwathGrid { geo_transform: gt, rectified_size: Some(size), georeferenced: true, derived: true })
}
