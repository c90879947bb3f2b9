//! [`RasterIo`] implementation over the GDAL command line utilities
//!
//! Datasets are inspected with `gdalinfo -json` and copied with
//! `gdal_translate`. Only the JSON report is kept in memory.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, error};
use serde_json::Value;

use super::{CopyRequest, GeolocationMode, GroundControlPoint, RasterDataset, RasterIo};
use crate::coordinate::GeoTransform;
use crate::errors::{WcsError, WcsResult};
use crate::external::CommandRunner;

/// Raster access through `gdalinfo` and `gdal_translate`
pub struct GdalCliRasterIo {
    gdalinfo: String,
    gdal_translate: String,
    runner: CommandRunner,
    timeout: Duration,
}

impl GdalCliRasterIo {
    /// Create the backend
    ///
    /// # Arguments
    /// * `gdalinfo` - Path of the gdalinfo executable
    /// * `gdal_translate` - Path of the gdal_translate executable
    /// * `runner` - Command runner shared with the other tools
    /// * `timeout` - Time budget for inspecting a dataset
    pub fn new(gdalinfo: &str, gdal_translate: &str, runner: CommandRunner, timeout: Duration) -> Self {
        GdalCliRasterIo {
            gdalinfo: gdalinfo.to_string(),
            gdal_translate: gdal_translate.to_string(),
            runner,
            timeout,
        }
    }

    /// `gdal_translate` command line for a copy request
    pub fn translate_arguments(request: &CopyRequest) -> Vec<String> {
        let mut args: Vec<String> = vec!["-q".into(), "-of".into(), request.driver.clone()];

        for band in &request.bands {
            args.push("-b".into());
            args.push(band.to_string());
        }
        if let Some(no_data) = request.no_data {
            args.push("-a_nodata".into());
            args.push(no_data.to_string());
        }
        if let Some(srs) = &request.srs {
            args.push("-a_srs".into());
            args.push(srs.clone());
        }
        if let Some(bounds) = &request.bounds {
            args.push("-a_ullr".into());
            for value in [bounds.min_x, bounds.max_y, bounds.max_x, bounds.min_y] {
                args.push(value.to_string());
            }
        }
        if !request.copy_source_metadata {
            args.push("-nomd".into());
        }
        for (key, value) in &request.metadata {
            args.push("-mo".into());
            args.push(format!("{}={}", key, value));
        }

        args.extend([
            "--config".to_string(),
            "GEOL_AS_GCPS".to_string(),
            request.geolocation.config_value().to_string(),
            request.source.clone(),
            request.destination.to_string_lossy().into_owned(),
        ]);
        args
    }
}

impl RasterIo for GdalCliRasterIo {
    fn open(&self, identifier: &str, mode: GeolocationMode) -> WcsResult<Box<dyn RasterDataset>> {
        let args: Vec<String> = [
            "-json", "-mm", "-mdd", "all", "--config", "GEOL_AS_GCPS", mode.config_value(), identifier,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let output = self
            .runner
            .run(&self.gdalinfo, &args, self.timeout)
            .map_err(|e| WcsError::no_applicable("RasterIo", e.to_string()))?;
        if !output.success() {
            debug!("gdalinfo stderr: {}", output.stderr.trim());
            return Err(WcsError::no_applicable(
                "RasterIo",
                format!("gdalinfo could not open {}: {}", identifier, output.stderr.trim()),
            ));
        }

        let report: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| WcsError::no_applicable("RasterIo", format!("Unreadable gdalinfo report: {}", e)))?;
        Ok(Box::new(GdalInfoDataset::from_json(identifier, &report)?))
    }

    fn create_copy(&self, request: &CopyRequest) -> WcsResult<()> {
        let args = Self::translate_arguments(request);
        let output = self
            .runner
            .run(&self.gdal_translate, &args, request.timeout)
            .map_err(|e| WcsError::no_applicable("RasterIo", e.to_string()))?;
        if !output.success() || !request.destination.exists() {
            error!("gdal_translate failed ({:?}): {}", output.status, output.stderr.trim());
            return Err(WcsError::no_applicable(
                "RasterIo",
                format!("Failed to create {} copy of {}", request.driver, request.source),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct BandReport {
    no_data: Option<f64>,
    metadata: Vec<(String, String)>,
    range: Option<(f64, f64)>,
}

/// A dataset described by a `gdalinfo -json` report
#[derive(Debug, Clone)]
pub struct GdalInfoDataset {
    identifier: String,
    driver: String,
    size: (usize, usize),
    bands: Vec<BandReport>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    metadata: HashMap<String, Vec<(String, String)>>,
    gcps: Vec<GroundControlPoint>,
    gcp_projection: Option<String>,
}

impl GdalInfoDataset {
    /// Build a dataset from a parsed gdalinfo JSON report
    pub fn from_json(identifier: &str, report: &Value) -> WcsResult<Self> {
        let driver = report["driverShortName"].as_str().unwrap_or("").to_string();
        let width = report["size"][0].as_u64();
        let height = report["size"][1].as_u64();
        let size = match (width, height) {
            (Some(w), Some(h)) => (w as usize, h as usize),
            _ => return Err(WcsError::no_applicable("RasterIo", "gdalinfo report has no raster size")),
        };

        let geo_transform = report["geoTransform"].as_array().and_then(|values| {
            let coefficients: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            <[f64; 6]>::try_from(coefficients).ok().map(GeoTransform)
        });

        let metadata = report["metadata"]
            .as_object()
            .map(|domains| {
                domains
                    .iter()
                    .map(|(domain, items)| (domain.clone(), metadata_items(domain, items)))
                    .collect()
            })
            .unwrap_or_default();

        let bands = report["bands"]
            .as_array()
            .map(|bands| bands.iter().map(band_report).collect())
            .unwrap_or_default();

        let gcps = report["gcps"]["gcpList"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|gcp| {
                        Some(GroundControlPoint {
                            pixel: gcp["pixel"].as_f64()?,
                            line: gcp["line"].as_f64()?,
                            x: gcp["x"].as_f64()?,
                            y: gcp["y"].as_f64()?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GdalInfoDataset {
            identifier: identifier.to_string(),
            driver,
            size,
            bands,
            geo_transform,
            projection: wkt_of(&report["coordinateSystem"]),
            metadata,
            gcps,
            gcp_projection: wkt_of(&report["gcps"]["coordinateSystem"]),
        })
    }

    fn band(&self, band: usize) -> Option<&BandReport> {
        band.checked_sub(1).and_then(|i| self.bands.get(i))
    }
}

fn wkt_of(crs: &Value) -> Option<String> {
    crs["wkt"].as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Key/value items of a metadata domain; `xml:` domains are lists of documents
fn metadata_items(domain: &str, items: &Value) -> Vec<(String, String)> {
    match items {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect(),
        Value::Array(list) => list.iter().map(|v| (domain.to_string(), value_to_string(v))).collect(),
        _ => Vec::new(),
    }
}

fn band_report(band: &Value) -> BandReport {
    let no_data = match &band["noDataValue"] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    let metadata = band["metadata"][""]
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect())
        .unwrap_or_default();
    let min = band["computedMin"].as_f64().or_else(|| band["minimum"].as_f64());
    let max = band["computedMax"].as_f64().or_else(|| band["maximum"].as_f64());

    BandReport { no_data, metadata, range: min.zip(max) }
}

impl RasterDataset for GdalInfoDataset {
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
        self.band(band).and_then(|b| b.no_data)
    }

    fn band_metadata(&self, band: usize) -> Vec<(String, String)> {
        self.band(band).map(|b| b.metadata.clone()).unwrap_or_default()
    }

    fn band_range(&self, band: usize) -> Option<(f64, f64)> {
        self.band(band).and_then(|b| b.range)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::BoundingBox;
    use std::path::PathBuf;

    const REPORT: &str = r#"{
      "description": "HDF4_EOS:EOS_GRID:\"MOD.hdf\":MOD_Grid:NDVI",
      "driverShortName": "HDF4Image",
      "size": [7200, 3600],
      "coordinateSystem": {"wkt": "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],AUTHORITY[\"EPSG\",\"4326\"]]"},
      "geoTransform": [-180.0, 0.05, 0.0, 90.0, 0.0, -0.05],
      "metadata": {
        "": {"RANGEBEGINNINGDATE": "2007-05-25", "WESTBOUNDINGCOORDINATE": "-180"},
        "xml:TRE": ["<tres><tre name=\"ACFTB\"/></tres>"]
      },
      "gcps": {"coordinateSystem": {"wkt": ""}, "gcpList": [
        {"id": "1", "pixel": 0.5, "line": 0.5, "x": 10.0, "y": 20.0, "z": 0.0}
      ]},
      "bands": [
        {"band": 1, "noDataValue": -3000, "computedMin": -2000.0, "computedMax": 10000.0,
         "metadata": {"": {"units": "NDVI", "valid_range": "-2000, 10000"}}}
      ]
    }"#;

    #[test]
    fn test_report_parsing() {
        let report: Value = serde_json::from_str(REPORT).unwrap();
        let ds = GdalInfoDataset::from_json("id", &report).unwrap();
        assert_eq!(ds.driver_name(), "HDF4Image");
        assert_eq!(ds.raster_size(), (7200, 3600));
        assert_eq!(ds.band_count(), 1);
        assert_eq!(ds.no_data_value(1), Some(-3000.0));
        assert_eq!(ds.no_data_value(2), None);
        assert_eq!(ds.band_range(1), Some((-2000.0, 10000.0)));
        assert_eq!(ds.geo_transform().unwrap().pixel_width(), 0.05);
        assert!(ds.projection().unwrap().starts_with("GEOGCS"));
        assert_eq!(ds.metadata_item("rangebeginningdate").as_deref(), Some("2007-05-25"));
        assert_eq!(ds.metadata("xml:TRE").len(), 1);
        assert_eq!(ds.gcps().len(), 1);
        assert_eq!(ds.gcp_projection(), None);
        assert_eq!(ds.band_metadata(1)[0].0, "units");
    }

    #[test]
    fn test_report_without_size() {
        let report: Value = serde_json::from_str(r#"{"driverShortName": "GTiff"}"#).unwrap();
        assert!(GdalInfoDataset::from_json("id", &report).is_err());
    }

    #[test]
    fn test_translate_arguments() {
        let mut request = CopyRequest::new("TRMM:3B42.nc:Daily", PathBuf::from("out.tmp.tif"), "GTiff", Duration::from_secs(5));
        request.bands = vec![1, 2];
        request.no_data = Some(-9999.9);
        request.srs = Some("EPSG:4326".to_string());
        request.bounds = Some(BoundingBox::new(-180.0, -50.0, 180.0, 50.0));
        request.copy_source_metadata = false;
        request.metadata = vec![("unit".to_string(), "mm".to_string())];

        let args = GdalCliRasterIo::translate_arguments(&request);
        let expected = [
            "-q", "-of", "GTiff", "-b", "1", "-b", "2", "-a_nodata", "-9999.9", "-a_srs", "EPSG:4326",
            "-a_ullr", "-180", "50", "180", "-50", "-nomd", "-mo", "unit=mm",
            "--config", "GEOL_AS_GCPS", "FULL", "TRMM:3B42.nc:Daily", "out.tmp.tif",
        ];
        assert_eq!(args, expected);
    }
}
