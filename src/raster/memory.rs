//! In-memory raster backend
//!
//! Datasets are registered up front and every copy, warp and compression
//! registers a derived dataset at its destination path. A small placeholder
//! file is written for each output so that file-based checks behave as they
//! would with the real tools.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{CopyRequest, GeolocationMode, GroundControlPoint, RasterDataset, RasterIo};
use crate::coordinate::{BoundingBox, GeoTransform};
use crate::errors::{WcsError, WcsResult};
use crate::external::{CompressJob, Compressor, ResampleJob, Resampler};
use crate::request::OutputShape;

#[derive(Debug, Clone, Default)]
struct MemoryBand {
    no_data: Option<f64>,
    metadata: Vec<(String, String)>,
    range: Option<(f64, f64)>,
}

/// A raster described entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    identifier: String,
    driver: String,
    size: (usize, usize),
    bands: Vec<MemoryBand>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    metadata: HashMap<String, Vec<(String, String)>>,
    gcps: Vec<GroundControlPoint>,
    gcp_projection: Option<String>,
}

impl MemoryDataset {
    /// A single-band dataset without georeferencing
    pub fn new(identifier: &str, driver: &str, width: usize, height: usize) -> Self {
        MemoryDataset {
            identifier: identifier.to_string(),
            driver: driver.to_string(),
            size: (width, height),
            bands: vec![MemoryBand::default()],
            geo_transform: None,
            projection: None,
            metadata: HashMap::new(),
            gcps: Vec::new(),
            gcp_projection: None,
        }
    }

    pub fn with_band_count(mut self, count: usize) -> Self {
        self.bands.resize(count, MemoryBand::default());
        self
    }

    pub fn with_no_data(mut self, band: usize, value: f64) -> Self {
        if let Some(b) = band.checked_sub(1).and_then(|i| self.bands.get_mut(i)) {
            b.no_data = Some(value);
        }
        self
    }

    pub fn with_band_metadata(mut self, band: usize, key: &str, value: &str) -> Self {
        if let Some(b) = band.checked_sub(1).and_then(|i| self.bands.get_mut(i)) {
            b.metadata.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn with_band_range(mut self, band: usize, min: f64, max: f64) -> Self {
        if let Some(b) = band.checked_sub(1).and_then(|i| self.bands.get_mut(i)) {
            b.range = Some((min, max));
        }
        self
    }

    pub fn with_geo_transform(mut self, gt: GeoTransform) -> Self {
        self.geo_transform = Some(gt);
        self
    }

    pub fn with_projection(mut self, projection: &str) -> Self {
        self.projection = Some(projection.to_string());
        self
    }

    /// Add an item to a metadata domain (`""` for the default domain)
    pub fn with_metadata(mut self, domain: &str, key: &str, value: &str) -> Self {
        self.metadata
            .entry(domain.to_string())
            .or_default()
            .push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_gcps(mut self, gcps: Vec<GroundControlPoint>, projection: Option<&str>) -> Self {
        self.gcps = gcps;
        self.gcp_projection = projection.map(str::to_string);
        self
    }

    fn derived(&self, identifier: &str, driver: &str) -> MemoryDataset {
        let mut copy = self.clone();
        copy.identifier = identifier.to_string();
        copy.driver = driver.to_string();
        copy
    }
}

impl RasterDataset for MemoryDataset {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn driver_name(&self) -> &str {
        &self.driver
    }

    fn raster_size(&self) -> (usize, usize) {
        self.size
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn no_data_value(&self, band: usize) -> Option<f64> {
        band.checked_sub(1).and_then(|i| self.bands.get(i)).and_then(|b| b.no_data)
    }

    fn band_metadata(&self, band: usize) -> Vec<(String, String)> {
        band.checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .map(|b| b.metadata.clone())
            .unwrap_or_default()
    }

    fn band_range(&self, band: usize) -> Option<(f64, f64)> {
        band.checked_sub(1).and_then(|i| self.bands.get(i)).and_then(|b| b.range)
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> Option<String> {
        self.projection.clone()
    }

    fn metadata(&self, domain: &str) -> Vec<(String, String)> {
        self.metadata.get(domain).cloned().unwrap_or_default()
    }

    fn gcps(&self) -> Vec<GroundControlPoint> {
        self.gcps.clone()
    }

    fn gcp_projection(&self) -> Option<String> {
        self.gcp_projection.clone()
    }
}

/// Registry-backed [`RasterIo`], [`Resampler`] and [`Compressor`]
#[derive(Default)]
pub struct MemoryRasterIo {
    datasets: RefCell<HashMap<String, MemoryDataset>>,
    opened: RefCell<Vec<(String, GeolocationMode)>>,
    copies: RefCell<Vec<CopyRequest>>,
    resamples: RefCell<Vec<ResampleJob>>,
    compressions: RefCell<Vec<CompressJob>>,
    fail_resample: Cell<bool>,
    fail_compress: Cell<bool>,
}

impl MemoryRasterIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, dataset: MemoryDataset) {
        self.datasets.borrow_mut().insert(dataset.identifier.clone(), dataset);
    }

    /// A registered or derived dataset
    pub fn dataset(&self, identifier: &str) -> Option<MemoryDataset> {
        self.datasets.borrow().get(identifier).cloned()
    }

    pub fn opened(&self) -> Vec<(String, GeolocationMode)> {
        self.opened.borrow().clone()
    }

    pub fn copies(&self) -> Vec<CopyRequest> {
        self.copies.borrow().clone()
    }

    pub fn resamples(&self) -> Vec<ResampleJob> {
        self.resamples.borrow().clone()
    }

    pub fn compressions(&self) -> Vec<CompressJob> {
        self.compressions.borrow().clone()
    }

    pub fn fail_resample(&self, fail: bool) {
        self.fail_resample.set(fail);
    }

    pub fn fail_compress(&self, fail: bool) {
        self.fail_compress.set(fail);
    }

    fn lookup(&self, identifier: &str) -> WcsResult<MemoryDataset> {
        self.dataset(identifier)
            .ok_or_else(|| WcsError::no_applicable("RasterIo", format!("No dataset registered as {}", identifier)))
    }

    fn write_placeholder(path: &Path, content: &str) -> WcsResult<()> {
        fs::write(path, content)?;
        Ok(())
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Output grid of a warp job over a source dataset
fn warped_grid(source: &MemoryDataset, job: &ResampleJob) -> (usize, usize, Option<GeoTransform>) {
    let (width, height) = source.size;
    let extent = job
        .extent
        .or_else(|| source.geo_transform.map(|gt| gt.bounds(width, height)));

    let (out_w, out_h) = match (job.shape, extent) {
        (OutputShape::Size { width, height }, _) => (width, height),
        (OutputShape::Resolution { x, y }, Some(extent)) => (
            ((extent.width() / x).round() as usize).max(1),
            ((extent.height() / y).round() as usize).max(1),
        ),
        _ => (width, height),
    };
    let gt = extent.map(|e: BoundingBox| GeoTransform::from_bounds(&e, out_w, out_h));
    (out_w, out_h, gt)
}

impl RasterIo for MemoryRasterIo {
    fn open(&self, identifier: &str, mode: GeolocationMode) -> WcsResult<Box<dyn RasterDataset>> {
        self.opened.borrow_mut().push((identifier.to_string(), mode));
        Ok(Box::new(self.lookup(identifier)?))
    }

    fn create_copy(&self, request: &CopyRequest) -> WcsResult<()> {
        let source = self.lookup(&request.source)?;
        let key = path_key(&request.destination);
        let mut copy = source.derived(&key, &request.driver);

        if !request.bands.is_empty() {
            copy.bands = request
                .bands
                .iter()
                .filter_map(|b| b.checked_sub(1).and_then(|i| source.bands.get(i)).cloned())
                .collect();
        }
        if let Some(no_data) = request.no_data {
            copy.bands.iter_mut().for_each(|b| b.no_data = Some(no_data));
        }
        if let Some(srs) = &request.srs {
            copy.projection = Some(srs.clone());
        }
        if let Some(bounds) = &request.bounds {
            copy.geo_transform = Some(GeoTransform::from_bounds(bounds, copy.size.0, copy.size.1));
        }
        if !request.copy_source_metadata {
            copy.metadata.clear();
        }
        let defaults = copy.metadata.entry(String::new()).or_default();
        for (k, v) in &request.metadata {
            defaults.retain(|(existing, _)| existing != k);
            defaults.push((k.clone(), v.clone()));
        }

        Self::write_placeholder(&request.destination, &format!("{} copy of {}", request.driver, request.source))?;
        self.datasets.borrow_mut().insert(key, copy);
        self.copies.borrow_mut().push(request.clone());
        Ok(())
    }
}

impl Resampler for MemoryRasterIo {
    fn resample(&self, job: &ResampleJob) -> WcsResult<()> {
        self.resamples.borrow_mut().push(job.clone());
        if self.fail_resample.get() {
            return Err(WcsError::no_applicable(
                "GdalWarp",
                "Failed to execute the GDAL command line in the back end.",
            ));
        }

        let source = self.lookup(&job.source)?;
        let key = path_key(&job.destination);
        let (width, height, gt) = warped_grid(&source, job);

        let mut warped = source.derived(&key, "GTiff");
        warped.size = (width, height);
        warped.geo_transform = gt;
        warped.gcps.clear();
        warped.gcp_projection = None;
        if let Some(srs) = &job.target_srs {
            warped.projection = Some(srs.clone());
        } else if warped.projection.is_none() {
            warped.projection = source.gcp_projection.clone();
        }
        warped.bands.iter_mut().for_each(|b| b.no_data = Some(job.no_data));

        Self::write_placeholder(&job.destination, &format!("warp of {}", job.source))?;
        self.datasets.borrow_mut().insert(key, warped);
        Ok(())
    }
}

impl Compressor for MemoryRasterIo {
    fn compress(&self, job: &CompressJob) -> WcsResult<()> {
        self.compressions.borrow_mut().push(job.clone());
        if self.fail_compress.get() {
            return Err(WcsError::no_applicable(
                "KakaduCompressor",
                "Failed to execute the Kakadu command line in the back end.",
            ));
        }

        let mut content = fs::read_to_string(&job.source).unwrap_or_default();
        if let Some(side_file) = &job.side_file {
            content.push('\n');
            content.push_str(&fs::read_to_string(side_file)?);
        }
        Self::write_placeholder(&job.destination, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Interpolation;
    use std::time::Duration;

    fn grid() -> MemoryDataset {
        MemoryDataset::new("HDF4_EOS:EOS_GRID:\"a.hdf\":G:NDVI", "HDF4Image", 100, 50)
            .with_band_count(2)
            .with_geo_transform(GeoTransform([0.0, 1.0, 0.0, 50.0, 0.0, -1.0]))
            .with_metadata("", "units", "NDVI")
    }

    #[test]
    fn test_open_unknown_dataset() {
        let io = MemoryRasterIo::new();
        assert!(io.open("missing", GeolocationMode::Full).is_err());
        assert_eq!(io.opened().len(), 1);
    }

    #[test]
    fn test_copy_applies_request() {
        let dir = tempfile::tempdir().unwrap();
        let io = MemoryRasterIo::new();
        io.register(grid());

        let destination = dir.path().join("out.tmp.tif");
        let mut request = CopyRequest::new(&grid().identifier, destination.clone(), "GTiff", Duration::from_secs(1));
        request.bands = vec![2];
        request.no_data = Some(-9999.0);
        request.copy_source_metadata = false;
        request.metadata = vec![("unit".to_string(), "mm".to_string())];
        io.create_copy(&request).unwrap();

        assert!(destination.exists());
        let copy = io.open(&destination.to_string_lossy(), GeolocationMode::Full).unwrap();
        assert_eq!(copy.driver_name(), "GTiff");
        assert_eq!(copy.band_count(), 1);
        assert_eq!(copy.no_data_value(1), Some(-9999.0));
        assert_eq!(copy.metadata_item("units"), None);
        assert_eq!(copy.metadata_item("unit").as_deref(), Some("mm"));
    }

    #[test]
    fn test_resample_grid() {
        let dir = tempfile::tempdir().unwrap();
        let io = MemoryRasterIo::new();
        io.register(grid());

        let job = ResampleJob {
            source: grid().identifier,
            destination: dir.path().join("out.tmp.warp.tif"),
            target_srs: Some("EPSG:4326".to_string()),
            extent: Some(BoundingBox::new(10.0, 10.0, 30.0, 20.0)),
            shape: OutputShape::Resolution { x: 0.5, y: 0.5 },
            no_data: -9999.0,
            interpolation: Interpolation::Nearest,
            timeout: Duration::from_secs(1),
        };
        io.resample(&job).unwrap();

        let warped = io.dataset(&job.destination.to_string_lossy()).unwrap();
        assert_eq!(warped.raster_size(), (40, 20));
        assert_eq!(warped.geo_transform().unwrap().origin_y(), 20.0);
        assert_eq!(warped.projection().as_deref(), Some("EPSG:4326"));

        io.fail_resample(true);
        assert!(io.resample(&job).is_err());
    }
}
