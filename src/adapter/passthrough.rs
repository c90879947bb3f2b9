//! NITF and GOES imagery
//!
//! These granules are georeferenced by the raster library itself; the adapter
//! only collects metadata.

use super::identifier::{CoverageFamily, CoverageIdentifier};
use super::metadata;
use super::{band_ranges, check_geo_transform, library_crs, missing_value, open_native, CoverageInfo, CoverageSubtype};
use crate::coordinate::SpatialReference;
use crate::errors::{WcsError, WcsResult};
use crate::raster::{GeolocationMode, RasterDataset, RasterIo};

/// Products the raster library georeferences on its own
pub struct PassthroughAdapter {
    pub(crate) info: CoverageInfo,
    pub(crate) dataset: Box<dyn RasterDataset>,
}

impl PassthroughAdapter {
    pub fn open(io: &dyn RasterIo, identifier: CoverageIdentifier, mode: GeolocationMode) -> WcsResult<Self> {
        let dataset = open_native(io, &identifier, mode)?;

        let crs = library_crs(dataset.as_ref()).unwrap_or(SpatialReference::LocalImage);
        let geo_transform = dataset
            .geo_transform()
            .ok_or_else(|| WcsError::no_applicable("SetGeoTransform", "Failed to get the geo-transform of coverage."))
            .and_then(check_geo_transform)?;

        let metadata = match identifier.family {
            CoverageFamily::Nitf => metadata::nitf(dataset.as_ref()),
            _ => metadata::goes(dataset.as_ref()),
        };

        let info = CoverageInfo {
            driver: dataset.driver_name().to_string(),
            crs,
            geo_transform,
            georeferenced: true,
            derived_georeferencing: false,
            raster_size: dataset.raster_size(),
            rectified_size: None,
            band_count: dataset.band_count(),
            missing_value: missing_value(dataset.as_ref(), identifier.family),
            subtype: CoverageSubtype::Rectified,
            metadata,
            band_ranges: band_ranges(dataset.as_ref()),
            identifier,
        };
        Ok(PassthroughAdapter { info, dataset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CoverageDispatcher;
    use crate::coordinate::GeoTransform;
    use crate::raster::{MemoryDataset, MemoryRasterIo};

    #[test]
    fn test_nitf_reads_resource_path() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new("/data/i_3001a.ntf", "NITF", 1024, 1024)
                .with_projection("EPSG:4326")
                .with_geo_transform(GeoTransform([85.0, 0.001, 0.0, 33.0, 0.0, -0.001]))
                .with_metadata("", "NITF_FHDR", "NITF02.10"),
        );
        let adapter = CoverageDispatcher::new(&io)
            .dispatch("NITF:\"/data/i_3001a.ntf\":IM1", GeolocationMode::Full)
            .unwrap();

        assert_eq!(adapter.resample_source(), "/data/i_3001a.ntf");
        assert_eq!(adapter.info().missing_value, 0.0);
        assert!(!adapter.requires_materialization(&[]));
        let extension = adapter.extract_metadata().extension.clone().unwrap();
        assert!(extension.contains("<field name=\"FHDR\" value=\"NITF02.10\" />"));
    }

    #[test]
    fn test_goes_without_crs_is_image_space() {
        let io = MemoryRasterIo::new();
        let id = "GOES:NETCDF:\"/data/goes13.nc\":IR";
        io.register(MemoryDataset::new(id, "netCDF", 100, 100).with_geo_transform(GeoTransform([0.0, 1.0, 0.0, 100.0, 0.0, -1.0])));
        let adapter = CoverageDispatcher::new(&io).dispatch(id, GeolocationMode::Full).unwrap();
        assert_eq!(adapter.resolve_native_crs(), &SpatialReference::LocalImage);
        assert_eq!(adapter.info().missing_value, -9999.0);
        assert!(adapter.requires_materialization(&[]));
    }

    #[test]
    fn test_missing_geotransform() {
        let io = MemoryRasterIo::new();
        io.register(MemoryDataset::new("/data/x.ntf", "NITF", 10, 10));
        assert!(CoverageDispatcher::new(&io).dispatch("NITF:/data/x.ntf:IM1", GeolocationMode::Full).is_err());
    }
}
