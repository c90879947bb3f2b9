//! Format adapters
//!
//! An adapter wraps one opened granule and answers the questions the
//! extraction pipeline asks of it: which CRS the raster is in, which
//! geotransform places it, what metadata travels with it and whether the
//! resampler can read it directly or needs a materialized GeoTIFF copy.
//!
//! The variant is chosen from the coverage identifier by
//! [`CoverageDispatcher`]; there is exactly one adapter per request.

pub mod dispatcher;
pub mod fixed_grid;
pub mod grid;
pub mod identifier;
pub mod metadata;
pub mod passthrough;
pub mod swath;

use std::path::Path;
use std::time::Duration;

use log::debug;

pub use dispatcher::CoverageDispatcher;
pub use fixed_grid::FixedGridAdapter;
pub use grid::GridAdapter;
pub use identifier::{CoverageFamily, CoverageIdentifier};
pub use metadata::CoverageMetadata;
pub use passthrough::PassthroughAdapter;
pub use swath::SwathAdapter;

use crate::coordinate::{BoundingBox, CrsResolver, GeoTransform, SpatialReference};
use crate::errors::{WcsError, WcsResult};
use crate::raster::{CopyRequest, GeolocationMode, RasterDataset, RasterIo};

/// How a coverage relates to its grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageSubtype {
    /// Regular grid placed by an affine geotransform
    Rectified,
    /// Irregular grid placed by geolocation arrays
    Referenceable,
}

impl CoverageSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageSubtype::Rectified => "RectifiedDataset",
            CoverageSubtype::Referenceable => "ReferenceableDataset",
        }
    }
}

/// Everything an adapter resolved about its coverage
#[derive(Debug, Clone)]
pub struct CoverageInfo {
    pub identifier: CoverageIdentifier,
    /// Driver reported by the raster library
    pub driver: String,
    pub crs: SpatialReference,
    pub geo_transform: GeoTransform,
    /// False when no georeferencing could be found (identity geotransform)
    pub georeferenced: bool,
    /// The adapter computed the geotransform itself instead of taking the library's
    pub derived_georeferencing: bool,
    pub raster_size: (usize, usize),
    /// Size of the rectified grid of a swath, when it differs from the raster
    pub rectified_size: Option<(usize, usize)>,
    pub band_count: usize,
    pub missing_value: f64,
    pub subtype: CoverageSubtype,
    pub metadata: CoverageMetadata,
    /// Value range of each band, when the library knows it
    pub band_ranges: Vec<Option<(f64, f64)>>,
}

impl CoverageInfo {
    /// Size of the grid the geotransform describes
    pub fn grid_size(&self) -> (usize, usize) {
        self.rectified_size.unwrap_or(self.raster_size)
    }

    pub fn native_bounds(&self) -> BoundingBox {
        let (width, height) = self.grid_size();
        self.geo_transform.bounds(width, height)
    }

    /// Dataset name used to label the range fields
    pub fn field_name(&self) -> String {
        self.identifier.dataset.trim_matches('"').replace(' ', "_")
    }
}

/// One adapter per supported product family
pub enum FormatAdapter {
    Grid(GridAdapter),
    Swath(SwathAdapter),
    FixedGrid(FixedGridAdapter),
    Passthrough(PassthroughAdapter),
}

impl FormatAdapter {
    pub fn info(&self) -> &CoverageInfo {
        match self {
            FormatAdapter::Grid(a) => &a.info,
            FormatAdapter::Swath(a) => &a.info,
            FormatAdapter::FixedGrid(a) => &a.info,
            FormatAdapter::Passthrough(a) => &a.info,
        }
    }

    /// The opened native dataset
    pub fn dataset(&self) -> &dyn RasterDataset {
        match self {
            FormatAdapter::Grid(a) => a.dataset.as_ref(),
            FormatAdapter::Swath(a) => a.dataset.as_ref(),
            FormatAdapter::FixedGrid(a) => a.dataset.as_ref(),
            FormatAdapter::Passthrough(a) => a.dataset.as_ref(),
        }
    }

    pub fn resolve_native_crs(&self) -> &SpatialReference {
        &self.info().crs
    }

    pub fn resolve_geo_transform(&self) -> GeoTransform {
        self.info().geo_transform
    }

    pub fn extract_metadata(&self) -> &CoverageMetadata {
        &self.info().metadata
    }

    pub fn subtype(&self) -> CoverageSubtype {
        self.info().subtype
    }

    pub fn band_count(&self) -> usize {
        self.info().band_count
    }

    /// Identifier or path the resampler reads when nothing is materialized
    pub fn resample_source(&self) -> &str {
        &self.info().identifier.library_id
    }

    /// Whether the resampler must read a GeoTIFF copy instead of the granule
    pub fn requires_materialization(&self, bands: &[usize]) -> bool {
        let info = self.info();
        let family_requires = matches!(
            info.identifier.family,
            CoverageFamily::Trmm | CoverageFamily::He5Grid | CoverageFamily::He5Swath | CoverageFamily::Goes
        );
        family_requires
            || !bands.is_empty()
            || (info.subtype == CoverageSubtype::Rectified && info.derived_georeferencing)
    }

    /// Write a single-file GeoTIFF copy of the selected bands
    ///
    /// Rectified coverages get the resolved CRS and extent assigned; swaths
    /// keep their geolocation so the resampler can still use it.
    pub fn materialized_view(
        &self,
        io: &dyn RasterIo,
        destination: &Path,
        bands: &[usize],
        timeout: Duration,
    ) -> WcsResult<()> {
        let info = self.info();
        let mut request = CopyRequest::new(self.resample_source(), destination.to_path_buf(), "GTiff", timeout);
        request.bands = bands.to_vec();
        request.no_data = Some(info.missing_value);

        if info.subtype == CoverageSubtype::Rectified && info.georeferenced {
            request.srs = info.crs.srs_arg();
            request.bounds = Some(info.native_bounds());
        }

        debug!("Materializing {} into {}", request.source, destination.display());
        io.create_copy(&request)
    }
}

/// Open the granule behind an identifier and run the checks shared by all families
pub(crate) fn open_native(
    io: &dyn RasterIo,
    identifier: &CoverageIdentifier,
    mode: GeolocationMode,
) -> WcsResult<Box<dyn RasterDataset>> {
    let dataset = io.open(&identifier.library_id, mode).map_err(|e| {
        debug!("Opening {} failed: {}", identifier.library_id, e);
        WcsError::no_applicable("InitialDataset", format!("Failed to open file \"{}\".", identifier.file))
    })?;

    if let Some(driver) = identifier.family.required_driver() {
        if !dataset.driver_name().eq_ignore_ascii_case(driver) {
            return Err(WcsError::no_applicable("InitialDataset", "Failed to get data format"));
        }
    }

    if dataset.band_count() < 1 {
        return Err(WcsError::no_applicable("InitialDataset", "Failed to get raster band for coverage."));
    }
    Ok(dataset)
}

/// First-band no-data value, else the family default
pub(crate) fn missing_value(dataset: &dyn RasterDataset, family: CoverageFamily) -> f64 {
    dataset.no_data_value(1).unwrap_or_else(|| family.default_missing_value())
}

/// CRS reported by the library, when it parses
pub(crate) fn library_crs(dataset: &dyn RasterDataset) -> Option<SpatialReference> {
    let text = dataset.projection()?;
    match CrsResolver::resolve(&text) {
        Ok(crs) => Some(crs),
        Err(e) => {
            debug!("Ignoring unparseable projection of {}: {}", dataset.identifier(), e);
            None
        }
    }
}

pub(crate) fn band_ranges(dataset: &dyn RasterDataset) -> Vec<Option<(f64, f64)>> {
    (1..=dataset.band_count()).map(|b| dataset.band_range(b)).collect()
}

/// Extent from the `WEST/EAST/SOUTH/NORTHBOUNDINGCOORDINATE` tags
pub(crate) fn bounding_tags(dataset: &dyn RasterDataset) -> Option<BoundingBox> {
    let edge = |key: &str| dataset.metadata_item(key).and_then(|v| v.trim().parse::<f64>().ok());
    Some(BoundingBox::from_edges(
        edge("WESTBOUNDINGCOORDINATE")?,
        edge("EASTBOUNDINGCOORDINATE")?,
        edge("SOUTHBOUNDINGCOORDINATE")?,
        edge("NORTHBOUNDINGCOORDINATE")?,
    ))
}

/// Reject geotransforms with a zero pixel size
pub(crate) fn check_geo_transform(gt: GeoTransform) -> WcsResult<GeoTransform> {
    if gt.pixel_width() == 0.0 || gt.pixel_height() == 0.0 || !gt.coefficients().iter().all(|c| c.is_finite()) {
        return Err(WcsError::no_applicable("SetGeoTransform", format!("Degenerate geotransform {}", gt)));
    }
    Ok(gt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{MemoryDataset, MemoryRasterIo};

    const GRID_ID: &str = "HDF4_EOS:EOS_GRID:\"/data/MOD.hdf\":MOD_Grid:NDVI";

    fn grid_adapter(io: &MemoryRasterIo) -> FormatAdapter {
        CoverageDispatcher::new(io).dispatch(GRID_ID, GeolocationMode::Full).unwrap()
    }

    #[test]
    fn test_materialization_rules() {
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(GRID_ID, "HDF4Image", 360, 180)
                .with_geo_transform(GeoTransform([-180.0, 1.0, 0.0, 90.0, 0.0, -1.0]))
                .with_projection("EPSG:4326"),
        );
        let adapter = grid_adapter(&io);
        assert!(!adapter.info().derived_georeferencing);
        assert!(!adapter.requires_materialization(&[]));
        assert!(adapter.requires_materialization(&[1]));
    }

    #[test]
    fn test_materialized_view_assigns_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let io = MemoryRasterIo::new();
        io.register(
            MemoryDataset::new(GRID_ID, "HDF4Image", 100, 50)
                .with_band_count(3)
                .with_metadata("", "WESTBOUNDINGCOORDINATE", "10")
                .with_metadata("", "EASTBOUNDINGCOORDINATE", "20")
                .with_metadata("", "SOUTHBOUNDINGCOORDINATE", "0")
                .with_metadata("", "NORTHBOUNDINGCOORDINATE", "5"),
        );
        let adapter = grid_adapter(&io);
        assert!(adapter.requires_materialization(&[]));

        let destination = dir.path().join("a.tmp.tif");
        adapter
            .materialized_view(&io, &destination, &[2, 3], Duration::from_secs(1))
            .unwrap();

        let copy = &io.copies()[0];
        assert_eq!(copy.bands, vec![2, 3]);
        assert_eq!(copy.no_data, Some(-9999.0));
        assert_eq!(copy.srs, None);
        assert_eq!(copy.bounds, Some(BoundingBox::new(10.0, 0.0, 20.0, 5.0)));
    }
}
