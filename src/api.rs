use std::io::Write;
use std::rc::Rc;

use log::info;

use crate::adapter::CoverageDispatcher;
use crate::config::{DatasetCatalog, ServiceConfig};
use crate::errors::WcsResult;
use crate::external::{CommandRunner, Compressor, GdalWarp, KakaduCompressor, Resampler};
use crate::pipeline::{native_identifier, Extraction, ExtractionOrchestrator, OutputTarget};
use crate::raster::{GdalCliRasterIo, GeolocationMode, RasterIo};
use crate::request::{RequestParser, ServiceRequest, SubsetRequest};

/// Main interface to the coverage service
pub struct EoWcs {
    config: ServiceConfig,
    catalog: DatasetCatalog,
    io: Rc<dyn RasterIo>,
    resampler: Rc<dyn Resampler>,
    compressor: Rc<dyn Compressor>,
}

impl EoWcs {
    /// Create a service backed by the GDAL and Kakadu command line tools
    ///
    /// # Arguments
    /// * `config` - Service configuration; its dataset catalogs are loaded here
    /// * `show_progress` - Show a console spinner while external tools run
    pub fn new(config: ServiceConfig, show_progress: bool) -> WcsResult<Self> {
        let catalog = config.load_catalog()?;
        info!("Loaded {} catalog entries", catalog.len());

        let tools = &config.tools;
        let runner = CommandRunner::new(show_progress);
        let io = Rc::new(GdalCliRasterIo::new(
            &tools.gdalinfo,
            &tools.gdal_translate,
            runner.clone(),
            tools.timeout,
        ));
        let resampler = Rc::new(GdalWarp::new(&tools.gdal_warp, runner.clone()));
        let compressor = Rc::new(KakaduCompressor::new(&tools.kakadu_compress, runner));

        Ok(Self::with_backends(config, catalog, io, resampler, compressor))
    }

    /// Create a service over explicit raster, resampling and compression backends
    pub fn with_backends(
        config: ServiceConfig,
        catalog: DatasetCatalog,
        io: Rc<dyn RasterIo>,
        resampler: Rc<dyn Resampler>,
        compressor: Rc<dyn Compressor>,
    ) -> Self {
        EoWcs { config, catalog, io, resampler, compressor }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Parse a KVP query string or an XML request document
    ///
    /// Anything up to and including a `?` is dropped from KVP input, so
    /// complete request URLs are accepted too.
    pub fn parse_request(&self, text: &str, xml: bool) -> WcsResult<ServiceRequest> {
        let parser = RequestParser::new(&self.config.access_url);
        if xml {
            parser.parse_xml(text)
        } else {
            let query = text.split_once('?').map_or(text, |(_, query)| query);
            parser.parse_kvp(query.trim())
        }
    }

    /// Extract a coverage
    ///
    /// # Arguments
    /// * `request` - A validated GetCoverage request
    /// * `target` - Output file (command line mode) or the response stream
    /// * `out` - Response stream; untouched for file targets
    ///
    /// # Returns
    /// The completed extraction or the error that ended it
    pub fn get_coverage<W: Write + ?Sized>(
        &self,
        request: &SubsetRequest,
        target: &OutputTarget,
        out: &mut W,
    ) -> WcsResult<Extraction> {
        let mut orchestrator = ExtractionOrchestrator::new(
            self.io.as_ref(),
            self.resampler.as_ref(),
            self.compressor.as_ref(),
            &self.config,
            &self.catalog,
        );
        orchestrator.execute(request, target, out)
    }

    /// Summarize a coverage without extracting it
    pub fn describe(&self, coverage_id: &str) -> WcsResult<String> {
        let native_id = native_identifier(&self.catalog, coverage_id);
        let adapter = CoverageDispatcher::new(self.io.as_ref()).dispatch(&native_id, GeolocationMode::Partial)?;
        let info = adapter.info();
        let (width, height) = info.grid_size();

        let bounds = info.native_bounds();
        let mut result = format!("Coverage: {}\n", coverage_id);
        result.push_str(&format!("  Identifier: {}\n", info.identifier.library_id));
        result.push_str(&format!("  Driver: {}\n", info.driver));
        result.push_str(&format!("  Subtype: {}\n", info.subtype.as_str()));
        result.push_str(&format!("  CRS: {}\n", info.crs));
        result.push_str(&format!("  Geotransform: {}\n", info.geo_transform));
        if !info.georeferenced {
            result.push_str("  Georeferencing: none (pixel coordinates)\n");
        }
        result.push_str(&format!("  Size: {}x{}\n", width, height));
        result.push_str(&format!(
            "  Bounds: {} {} {} {}\n",
            bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
        ));
        result.push_str(&format!("  Bands: {}\n", info.band_count));
        result.push_str(&format!("  Missing value: {}\n", info.missing_value));

        let entry = self.catalog.lookup(coverage_id);
        let begin = info
            .metadata
            .begin_time
            .clone()
            .or_else(|| entry.and_then(|e| e.begin_time.clone()));
        let end = info
            .metadata
            .end_time
            .clone()
            .or_else(|| entry.and_then(|e| e.end_time.clone()));
        if begin.is_some() || end.is_some() {
            result.push_str(&format!(
                "  Time: {} / {}\n",
                begin.as_deref().unwrap_or(".."),
                end.as_deref().unwrap_or("..")
            ));
        }
        Ok(result)
    }
}
