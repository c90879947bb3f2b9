//! TRMM 3B42 daily precipitation
//!
//! The product files carry no usable georeferencing, but the grid never
//! changes: 0.25 degree cells between 50S and 50N.

use log::debug;

use super::identifier::CoverageIdentifier;
use super::metadata;
use super::{band_ranges, missing_value, open_native, CoverageInfo, CoverageSubtype};
use crate::coordinate::{GeoTransform, SpatialReference};
use crate::errors::WcsResult;
use crate::raster::{GeolocationMode, RasterDataset, RasterIo};

pub const TRMM_GEO_TRANSFORM: [f64; 6] = [-180.0, 0.25, 0.0, 50.0, 0.0, -0.25];
pub const TRMM_SIZE: (usize, usize) = (1440, 400);

/// Fixed-grid products that are always materialized before resampling
pub struct FixedGridAdapter {
    pub(crate) info: CoverageInfo,
    pub(crate) dataset: Box<dyn RasterDataset>,
}

impl FixedGridAdapter {
    pub fn open(io: &dyn RasterIo, identifier: CoverageIdentifier, mode: GeolocationMode) -> WcsResult<Self> {
        let dataset = open_native(io, &identifier, mode)?;
        if !identifier.is_daily() {
            debug!("TRMM dataset {} is not the daily product", identifier.dataset);
        }

        let info = CoverageInfo {
            driver: dataset.driver_name().to_string(),
            crs: SpatialReference::Wgs84,
            geo_transform: GeoTransform(TRMM_GEO_TRANSFORM),
            georeferenced: true,
            derived_georeferencing: true,
            raster_size: TRMM_SIZE,
            rectified_size: None,
            band_count: dataset.band_count(),
            missing_value: missing_value(dataset.as_ref(), identifier.family),
            subtype: CoverageSubtype::Rectified,
            metadata: metadata::trmm(),
            band_ranges: band_ranges(dataset.as_ref()),
            identifier,
        };
        Ok(FixedGridAdapter { info, dataset })
    }
}
