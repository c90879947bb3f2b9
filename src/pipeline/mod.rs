//! Extraction pipeline
//!
//! One [`ExtractionOrchestrator`] drives one GetCoverage request through
//! `Init → Resolved → Subsetted → Resampled → Encoded → Delivered`. Any stage
//! may fail; the orchestrator then lands in `Failed` and every temporary file
//! of the request is gone by the time the error is returned.

pub mod artifacts;
pub mod delivery;
pub mod eo_metadata;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, error, info, warn};

pub use artifacts::{unique_output_path, TempArtifacts};
pub use delivery::DeliveryMode;
pub use eo_metadata::{BandDescription, EoMetadata};

use crate::adapter::{CoverageDispatcher, CoverageInfo, FormatAdapter};
use crate::config::{CatalogEntry, DatasetCatalog, ServiceConfig};
use crate::coordinate::{BoundingBox, CoordinateTransformer};
use crate::errors::{WcsError, WcsResult};
use crate::external::{CompressJob, Compressor, ResampleJob, Resampler};
use crate::planner::{OutputGridPlanner, OutputPlan};
use crate::raster::{CopyRequest, GeolocationMode, RasterIo};
use crate::request::{OutputFormat, SubsetRequest};

/// Metadata items never carried into the output file
const SUPPRESSED_METADATA: &[&str] = &[
    "TIFFTAG_XRESOLUTION",
    "TIFFTAG_YRESOLUTION",
    "TIFFTAG_RESOLUTIONUNIT",
    "INPUTPOINTER",
];

/// Metadata items replaced by the extent of the response
const BOUNDING_METADATA: &[&str] = &[
    "WESTBOUNDINGCOORDINATE",
    "EASTBOUNDINGCOORDINATE",
    "SOUTHBOUNDINGCOORDINATE",
    "NORTHBOUNDINGCOORDINATE",
];

const COMPRESSOR_PARAMETERS: &[&str] = &["ORGgen_plt=yes", "Creversible=yes"];

/// Stage of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Resolved,
    Subsetted,
    Resampled,
    Encoded,
    Delivered,
    Failed,
}

impl PipelineState {
    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Init => Some(PipelineState::Resolved),
            PipelineState::Resolved => Some(PipelineState::Subsetted),
            PipelineState::Subsetted => Some(PipelineState::Resampled),
            PipelineState::Resampled => Some(PipelineState::Encoded),
            PipelineState::Encoded => Some(PipelineState::Delivered),
            PipelineState::Delivered | PipelineState::Failed => None,
        }
    }
}

/// Where the final artifact goes
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    /// Leave the artifact at this path (command line mode)
    File(PathBuf),
    /// Stream or reference the artifact on the response writer
    Respond,
}

/// Outcome of a completed request
#[derive(Debug, Clone)]
pub struct Extraction {
    pub output: PathBuf,
    pub plan: OutputPlan,
    /// `None` when the artifact was written to a file target
    pub delivery: Option<DeliveryMode>,
    pub eo_metadata: String,
    /// Whether the artifact still exists once the request is done
    pub retained: bool,
}

/// Native identifier of a published coverage name
///
/// Names missing from the catalog are taken as native identifiers.
pub fn native_identifier(catalog: &DatasetCatalog, coverage_id: &str) -> String {
    match catalog.lookup(coverage_id) {
        Some(entry) if !entry.coverage_id.trim().is_empty() => {
            debug!("Catalog maps {} to {}", coverage_id, entry.coverage_id);
            entry.coverage_id.trim().to_string()
        }
        _ => coverage_id.to_string(),
    }
}

/// Drives one request from the wire model to the delivered artifact
pub struct ExtractionOrchestrator<'a> {
    io: &'a dyn RasterIo,
    resampler: &'a dyn Resampler,
    compressor: &'a dyn Compressor,
    config: &'a ServiceConfig,
    catalog: &'a DatasetCatalog,
    state: PipelineState,
}

impl<'a> ExtractionOrchestrator<'a> {
    pub fn new(
        io: &'a dyn RasterIo,
        resampler: &'a dyn Resampler,
        compressor: &'a dyn Compressor,
        config: &'a ServiceConfig,
        catalog: &'a DatasetCatalog,
    ) -> Self {
        ExtractionOrchestrator { io, resampler, compressor, config, catalog, state: PipelineState::Init }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the request; the response, if any, is written to `out`
    pub fn execute<W: Write + ?Sized>(
        &mut self,
        request: &SubsetRequest,
        target: &OutputTarget,
        out: &mut W,
    ) -> WcsResult<Extraction> {
        if self.state != PipelineState::Init {
            return Err(self.transition_error(PipelineState::Resolved));
        }

        let result = self.run(request, target, out);
        if let Err(e) = &result {
            error!("Request for {} failed after {:?}: {}", request.coverage_id, self.state, e);
            self.state = PipelineState::Failed;
        }
        result
    }

    fn run<W: Write + ?Sized>(
        &mut self,
        request: &SubsetRequest,
        target: &OutputTarget,
        out: &mut W,
    ) -> WcsResult<Extraction> {
        let timeout = self.config.tools.timeout;

        let format = OutputFormat::from_request(&request.format)?;
        let native_id = native_identifier(self.catalog, &request.coverage_id);
        let adapter = CoverageDispatcher::new(self.io).dispatch(&native_id, GeolocationMode::Full)?;
        let entry = self.catalog.lookup(&request.coverage_id);
        self.advance(PipelineState::Resolved)?;

        let output = match target {
            OutputTarget::File(path) => path.clone(),
            OutputTarget::Respond => unique_output_path(
                &self.config.temporary_output_directory,
                &request.coverage_id,
                format.suffix,
            ),
        };
        let mut artifacts = TempArtifacts::new(output.clone());

        validate_bands(&request.bands, adapter.band_count())?;
        let source = if adapter.requires_materialization(&request.bands) {
            let path = artifacts.materialized();
            adapter.materialized_view(self.io, &path, &request.bands, timeout)?;
            path.to_string_lossy().into_owned()
        } else {
            adapter.resample_source().to_string()
        };
        let subset_bbox = subset_bbox(request, adapter.info())?;
        let plan = OutputGridPlanner::plan(adapter.info(), request, subset_bbox, format);
        info!("Planned {} as {}", request.coverage_id, plan);
        self.advance(PipelineState::Subsetted)?;

        let warped = artifacts.warped();
        let target_srs = match (&request.output_crs, request.has_spatial_subset()) {
            (Some(crs), _) => crs.srs_arg(),
            (None, true) => request.request_crs.srs_arg(),
            (None, false) => None,
        };
        let job = ResampleJob {
            source,
            destination: warped.clone(),
            target_srs,
            extent: subset_bbox,
            shape: request.shape,
            no_data: adapter.info().missing_value,
            interpolation: request.interpolation,
            timeout,
        };
        self.resampler.resample(&job)?;
        self.advance(PipelineState::Resampled)?;

        let eo_metadata = self
            .eo_metadata(request, &adapter, entry, &plan, &warped, &output)
            .render()?;
        if format.uses_compressor() {
            let side_file = artifacts.side_file();
            fs::write(&side_file, format!("xml {}", eo_metadata))?;
            self.compressor.compress(&CompressJob {
                source: warped,
                destination: output.clone(),
                side_file: Some(side_file),
                parameters: COMPRESSOR_PARAMETERS.iter().map(|p| p.to_string()).collect(),
                timeout,
            })?;
        } else {
            let mut copy = CopyRequest::new(&warped.to_string_lossy(), output.clone(), format.driver, timeout);
            copy.copy_source_metadata = false;
            copy.metadata = output_metadata(&adapter, &plan.bbox, &eo_metadata);
            self.io.create_copy(&copy)?;
        }
        self.advance(PipelineState::Encoded)?;

        let delivery = match target {
            OutputTarget::File(_) => {
                artifacts.keep_output();
                None
            }
            OutputTarget::Respond => {
                let mode = DeliveryMode::for_request(request);
                match mode {
                    DeliveryMode::Direct => {
                        delivery::deliver_direct(out, &output, format.content_type)?;
                    }
                    DeliveryMode::Multipart => {
                        delivery::deliver_multipart(out, &output, format.content_type, &eo_metadata)?;
                    }
                    DeliveryMode::Store => {
                        delivery::deliver_store(out, &output, &self.config.output_prefix_url)?;
                    }
                }
                if mode.keeps_artifact() {
                    artifacts.keep_output();
                }
                Some(mode)
            }
        };
        self.advance(PipelineState::Delivered)?;

        Ok(Extraction {
            output,
            plan,
            delivery,
            eo_metadata,
            retained: delivery.map_or(true, |mode| mode.keeps_artifact()),
        })
    }

    fn advance(&mut self, next: PipelineState) -> WcsResult<()> {
        if self.state.successor() != Some(next) {
            return Err(self.transition_error(next));
        }
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn transition_error(&self, next: PipelineState) -> WcsError {
        WcsError::no_applicable(
            "ExtractionOrchestrator",
            format!("Invalid pipeline transition from {:?} to {:?}", self.state, next),
        )
    }

    fn eo_metadata(
        &self,
        request: &SubsetRequest,
        adapter: &FormatAdapter,
        entry: Option<&CatalogEntry>,
        plan: &OutputPlan,
        warped: &Path,
        output: &Path,
    ) -> EoMetadata {
        let info = adapter.info();
        let metadata = adapter.extract_metadata();

        let (grid_size, geo_transform) = match self.io.open(&warped.to_string_lossy(), GeolocationMode::Full) {
            Ok(dataset) => (
                dataset.raster_size(),
                dataset.geo_transform().unwrap_or(plan.geo_transform),
            ),
            Err(e) => {
                warn!("Could not read the resampled grid, using the planned one: {}", e);
                ((plan.width, plan.height), plan.geo_transform)
            }
        };

        let selected: Vec<usize> = if request.bands.is_empty() {
            (1..=info.band_count).collect()
        } else {
            request.bands.clone()
        };
        let bands = selected
            .iter()
            .map(|b| BandDescription {
                nil_value: info.missing_value,
                range: info
                    .band_ranges
                    .get(b - 1)
                    .copied()
                    .flatten()
                    .or_else(|| metadata.allowed_bounds()),
            })
            .collect();

        let filename = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        EoMetadata {
            file_url: format!("{}{}", self.config.output_prefix_url, filename),
            filename,
            bbox: plan.bbox,
            crs: plan.crs.clone(),
            grid_size,
            geo_transform,
            content_type: plan.format.content_type.to_string(),
            field_name: info.field_name(),
            quantity: metadata.quantity.clone(),
            bands,
            extension: metadata.extension.clone(),
            begin_time: metadata
                .begin_time
                .clone()
                .or_else(|| entry.and_then(|e| e.begin_time.clone()))
                .or_else(|| request.time.begin.clone()),
            end_time: metadata
                .end_time
                .clone()
                .or_else(|| entry.and_then(|e| e.end_time.clone()))
                .or_else(|| request.time.end.clone()),
            request_url: request.request_url.clone(),
            generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

fn validate_bands(bands: &[usize], band_count: usize) -> WcsResult<()> {
    match bands.iter().find(|&&b| b == 0 || b > band_count) {
        Some(band) => Err(WcsError::invalid(
            "RANGESUBSET",
            format!("Band {} is out of range; the coverage has {} bands.", band, band_count),
        )),
        None => Ok(()),
    }
}

/// Requested extent in the CRS of the output grid
fn subset_bbox(request: &SubsetRequest, info: &CoverageInfo) -> WcsResult<Option<BoundingBox>> {
    if !request.has_spatial_subset() {
        return Ok(None);
    }

    let native = info.native_bounds();
    let complete = request.spatial.x.is_some() && request.spatial.y.is_some();
    let fill = if complete || info.crs.is_local() {
        native
    } else {
        CoordinateTransformer
            .transform_bbox(&native, &info.crs, &request.request_crs)
            .unwrap_or_else(|e| {
                debug!("Native extent not expressible in the request CRS: {}", e);
                native
            })
    };
    let bbox = request.spatial.resolve(&fill);

    match &request.output_crs {
        Some(output_crs) if !request.request_crs.same_as(output_crs) => CoordinateTransformer
            .transform_bbox(&bbox, &request.request_crs, output_crs)
            .map(Some)
            .map_err(|e| {
                warn!("Transforming {:?} to {} failed: {}", bbox, output_crs, e);
                WcsError::no_applicable(
                    "OUTPUTCRS",
                    "Failed to transform bbox coordinate from request CRS to response CRS.",
                )
            }),
        _ => Ok(Some(bbox)),
    }
}

/// Adapter metadata as written into the output file
fn output_metadata(adapter: &FormatAdapter, bbox: &BoundingBox, eo_metadata: &str) -> Vec<(String, String)> {
    let reserved = |key: &str| {
        SUPPRESSED_METADATA
            .iter()
            .chain(BOUNDING_METADATA)
            .any(|r| r.eq_ignore_ascii_case(key))
    };

    let mut items: Vec<(String, String)> = adapter
        .extract_metadata()
        .items
        .iter()
        .filter(|(key, _)| !reserved(key))
        .cloned()
        .collect();

    for (key, value) in BOUNDING_METADATA
        .iter()
        .zip([bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y])
    {
        items.push((key.to_string(), value.to_string()));
    }
    items.push(("EOMetadataContents".to_string(), eo_metadata.to_string()));
    items
}
