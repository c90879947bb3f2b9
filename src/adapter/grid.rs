//! HDF-EOS2 and HDF-EOS5 grids

use log::{debug, warn};

use super::identifier::{CoverageFamily, CoverageIdentifier};
use super::metadata;
use super::{
    band_ranges, bounding_tags, check_geo_transform, library_crs, missing_value, open_native, CoverageInfo,
    CoverageSubtype,
};
use crate::coordinate::{BoundingBox, GeoTransform, ProjectionTable, SpatialReference};
use crate::errors::{WcsError, WcsResult};
use crate::raster::{GeolocationMode, RasterDataset, RasterIo};

/// Regular grid products
pub struct GridAdapter {
    pub(crate) info: CoverageInfo,
    pub(crate) dataset: Box<dyn RasterDataset>,
}

impl GridAdapter {
    pub fn open(io: &dyn RasterIo, identifier: CoverageIdentifier, mode: GeolocationMode) -> WcsResult<Self> {
        let dataset = open_native(io, &identifier, mode)?;
        let family = identifier.family;

        let (metadata, fill_value) = if family.is_hdf_eos5() {
            metadata::hdf_eos5(family, dataset.as_ref())
        } else {
            (metadata::hdf_eos2(family, dataset.as_ref()), None)
        };
        let missing_value = fill_value.unwrap_or_else(|| missing_value(dataset.as_ref(), family));

        let crs = Self::resolve_crs(dataset.as_ref());
        let (geo_transform, derived) = Self::resolve_geo_transform(dataset.as_ref(), &identifier)?;
        debug!("Grid {} resolved to {} with {}", identifier.dataset, crs, geo_transform);

        let info = CoverageInfo {
            driver: dataset.driver_name().to_string(),
            crs,
            geo_transform,
            georeferenced: true,
            derived_georeferencing: derived,
            raster_size: dataset.raster_size(),
            rectified_size: None,
            band_count: dataset.band_count(),
            missing_value,
            subtype: CoverageSubtype::Rectified,
            metadata,
            band_ranges: band_ranges(dataset.as_ref()),
            identifier,
        };
        Ok(GridAdapter { info, dataset })
    }

    /// Library CRS, replaced by the table definition of its GCTP projection
    fn resolve_crs(dataset: &dyn RasterDataset) -> SpatialReference {
        let crs = match library_crs(dataset) {
            Some(crs) => crs,
            None => return SpatialReference::LocalImage,
        };
        if crs.is_local() {
            return crs;
        }

        let code = match crs.gctp_code() {
            Some(code) => code,
            None => {
                warn!("No GCTP projection code for {}; keeping the library CRS", crs);
                return crs;
            }
        };
        match ProjectionTable::global().lookup(code) {
            Some(definition) => match definition.spatial_reference() {
                Ok(replacement) => {
                    debug!("GCTP code {} replaced by {}", code, definition.name);
                    replacement
                }
                Err(e) => {
                    warn!("Projection table entry {} is unusable: {}", definition.name, e);
                    crs
                }
            },
            None => crs,
        }
    }

    /// Geotransform and whether it was derived from metadata
    fn resolve_geo_transform(
        dataset: &dyn RasterDataset,
        identifier: &CoverageIdentifier,
    ) -> WcsResult<(GeoTransform, bool)> {
        if identifier.family == CoverageFamily::He5Grid {
            if let Some(gt) = grid_span(dataset, &identifier.data_type) {
                return Ok((check_geo_transform(gt)?, true));
            }
        }

        if let Some(bbox) = bounding_tags(dataset) {
            let (width, height) = dataset.raster_size();
            return Ok((check_geo_transform(GeoTransform::from_bounds(&bbox, width, height))?, true));
        }

        match dataset.geo_transform() {
            Some(gt) => Ok((check_geo_transform(gt)?, false)),
            None => Err(WcsError::no_applicable(
                "SetGeoTransform",
                "Failed to get the geo-transform of coverage.",
            )),
        }
    }
}

/// HDF-EOS5 `<grid>:GridSpan` `(minX,maxX,minY,maxY)` with `<grid>:GridSpacing` `(res,res)`
fn grid_span(dataset: &dyn RasterDataset, grid: &str) -> Option<GeoTransform> {
    let span = numbers(&dataset.metadata_item(&format!("{}:GridSpan", grid))?);
    let spacing = numbers(&dataset.metadata_item(&format!("{}:GridSpacing", grid))?);
    if span.len() < 4 {
        return None;
    }
    let resolution = *spacing.first()?;
    let bbox = BoundingBox::from_edges(span[0], span[1], span[2], span[3]);
    Some(GeoTransform::north_up(bbox.min_x, bbox.max_y, resolution, resolution))
}

fn numbers(text: &str) -> Vec<f64> {
    text.trim_matches(|c| c == '(' || c == ')' || c == ' ')
        .split(',')
        .filter_map(|s| s.trim().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{CoverageDispatcher, FormatAdapter};
    use crate::errors::ExceptionCode;
    use crate::raster::{MemoryDataset, MemoryRasterIo};

    const HE4: &str = "HDF4_EOS:EOS_GRID:\"/data/MOD13C1.hdf\":MODIS_Grid_16Day_VI_CMG:NDVI";
    const HE5: &str = "HDF5:\"/data/OMI.he5\"://HDFEOS/GRIDS/OMI Total Column Amount SO2/Data Fields/ColumnAmountSO2_PBL";

    const SINUSOIDAL_WKT: &str = r#"PROJCS["unnamed",GEOGCS["Unknown datum based upon the custom spheroid",DATUM["Not specified (based on custom spheroid)",SPHEROID["Custom spheroid",6371007.181,0]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Sinusoidal"],PARAMETER["longitude_of_center",0],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["Meter",1]]"#;

    fn open(io: &MemoryRasterIo, id: &str) -> WcsResult<CoverageInfo> {
        match CoverageDispatcher::new(io).dispatch(id, GeolocationMode::Full)? {
            FormatAdapter::Grid(adapter) => Ok(adapter.info),
            _ => panic!("expected a grid adapter"),
        }
    }

    #[test]
    fn test_bounding_tags_with_antimeridian_swap() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(HE4, "HDF4Image", 200, 100)
                .with_metadata("", "WESTBOUNDINGCOORDINATE", "170")
                .with_metadata("", "EASTBOUNDINGCOORDINATE", "-170")
                .with_metadata("", "SOUTHBOUNDINGCOORDINATE", "-10")
                .with_metadata("", "NORTHBOUNDINGCOORDINATE", "40")
                .with_geo_transform(GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, -1.0])),
        );
        let info = open(&io, HE4).unwrap();
        assert_eq!(info.geo_transform, GeoTransform([-170.0, 340.0 / 200.0, 0.0, 40.0, 0.0, -0.5]));
        assert!(info.derived_georeferencing);
        assert_eq!(info.crs, SpatialReference::LocalImage);
        assert_eq!(info.missing_value, -9999.0);
    }

    #[test]
    fn test_sinusoidal_replaced_from_table() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(HE4, "HDF4Image", 4800, 4800)
                .with_projection(SINUSOIDAL_WKT)
                .with_no_data(1, -3000.0)
                .with_geo_transform(GeoTransform([-20015109.354, 926.625, 0.0, 10007554.677, 0.0, -926.625])),
        );
        let info = open(&io, HE4).unwrap();
        assert!(info.crs.to_string().starts_with("MODIS Sinusoidal"));
        assert!(!info.derived_georeferencing);
        assert_eq!(info.missing_value, -3000.0);
    }

    #[test]
    fn test_geographic_grid_becomes_wgs84() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(HE4, "HDF4Image", 3600, 1800)
                .with_projection("GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]")
                .with_geo_transform(GeoTransform([-180.0, 0.1, 0.0, 90.0, 0.0, -0.1])),
        );
        assert_eq!(open(&io, HE4).unwrap().crs, SpatialReference::Wgs84);
    }

    #[test]
    fn test_hdf_eos5_grid_span_takes_precedence() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(HE5, "HDF5Image", 1440, 720)
                .with_metadata("", "OMI Total Column Amount SO2:GridSpan", "(-180,180,-90,90)")
                .with_metadata("", "OMI Total Column Amount SO2:GridSpacing", "(0.25,0.25)")
                .with_metadata("", "WESTBOUNDINGCOORDINATE", "0")
                .with_metadata("", "EASTBOUNDINGCOORDINATE", "1")
                .with_metadata("", "SOUTHBOUNDINGCOORDINATE", "0")
                .with_metadata("", "NORTHBOUNDINGCOORDINATE", "1")
                .with_band_metadata(1, "ColumnAmountSO2_PBL__FillValue", "-1e30"),
        );
        let info = open(&io, HE5).unwrap();
        assert_eq!(info.geo_transform, GeoTransform([-180.0, 0.25, 0.0, 90.0, 0.0, -0.25]));
        assert_eq!(info.missing_value, -1e30);
        assert_eq!(info.metadata.platform.as_deref(), Some("Aura"));
    }

    #[test]
    fn test_no_georeferencing_is_an_error() {
        let io = MemoryRasterIo::new();
        io.register(MemoryDataset::new(HE4, "HDF4Image", 10, 10));
        let err = open(&io, HE4).err().unwrap();
        assert_eq!(err.code(), ExceptionCode::NoApplicableCode);
    }
}
