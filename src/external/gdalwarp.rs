use log::error;

use super::command::CommandRunner;
use super::{ResampleJob, Resampler};
use crate::errors::{WcsError, WcsResult};
use crate::request::OutputShape;

const FAILURE_MESSAGE: &str = "Failed to execute the GDAL command line in the back end.";

/// [`Resampler`] backed by the `gdalwarp` executable
pub struct GdalWarp {
    program: String,
    runner: CommandRunner,
}

impl GdalWarp {
    pub fn new(program: &str, runner: CommandRunner) -> Self {
        GdalWarp { program: program.to_string(), runner }
    }

    /// Command line for a job:
    /// `-q -of GTiff [-t_srs] [-te] [-ts|-tr] -dstnodata -r <src> <dst>`
    pub fn arguments(job: &ResampleJob) -> Vec<String> {
        let mut args: Vec<String> = vec!["-q".into(), "-of".into(), "GTiff".into()];

        if let Some(srs) = &job.target_srs {
            args.push("-t_srs".into());
            args.push(srs.clone());
        }

        if let Some(extent) = &job.extent {
            args.push("-te".into());
            for value in [extent.min_x, extent.min_y, extent.max_x, extent.max_y] {
                args.push(value.to_string());
            }
        }

        match job.shape {
            OutputShape::Size { width, height } => {
                args.extend(["-ts".to_string(), width.to_string(), height.to_string()]);
            }
            OutputShape::Resolution { x, y } => {
                args.extend(["-tr".to_string(), x.to_string(), y.to_string()]);
            }
            OutputShape::Native => {}
        }

        args.push("-dstnodata".into());
        args.push(job.no_data.to_string());
        args.push("-r".into());
        args.push(job.interpolation.resampler_name().into());
        args.push(job.source.clone());
        args.push(job.destination.to_string_lossy().into_owned());
        args
    }
}

impl Resampler for GdalWarp {
    fn resample(&self, job: &ResampleJob) -> WcsResult<()> {
        let args = Self::arguments(job);
        let output = self.runner.run(&self.program, &args, job.timeout).map_err(|e| {
            error!("gdalwarp could not run: {}", e);
            WcsError::no_applicable("GdalWarp", format!("{} {}", FAILURE_MESSAGE, e))
        })?;

        if !output.success() || !job.destination.exists() {
            error!("gdalwarp failed ({:?}): {}", output.status, output.stderr.trim());
            return Err(WcsError::no_applicable("GdalWarp", FAILURE_MESSAGE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::BoundingBox;
    use crate::request::Interpolation;
    use std::path::PathBuf;
    use std::time::Duration;

    fn job(shape: OutputShape) -> ResampleJob {
        ResampleJob {
            source: "HDF4_EOS:EOS_GRID:\"a.hdf\":G:NDVI".to_string(),
            destination: PathBuf::from("/tmp/out.tmp.warp.tif"),
            target_srs: Some("EPSG:4326".to_string()),
            extent: Some(BoundingBox::new(10.0, 20.0, 30.0, 40.0)),
            shape,
            no_data: -9999.0,
            interpolation: Interpolation::Bilinear,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_full_argument_list() {
        let args = GdalWarp::arguments(&job(OutputShape::Size { width: 200, height: 100 }));
        let expected = [
            "-q", "-of", "GTiff", "-t_srs", "EPSG:4326", "-te", "10", "20", "30", "40", "-ts", "200", "100",
            "-dstnodata", "-9999", "-r", "bilinear", "HDF4_EOS:EOS_GRID:\"a.hdf\":G:NDVI", "/tmp/out.tmp.warp.tif",
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_resolution_and_native() {
        let args = GdalWarp::arguments(&job(OutputShape::Resolution { x: 0.5, y: 0.25 }));
        let tr = args.iter().position(|a| a == "-tr").unwrap();
        assert_eq!(&args[tr + 1..tr + 3], ["0.5", "0.25"]);

        let mut native = job(OutputShape::Native);
        native.extent = None;
        native.target_srs = None;
        let args = GdalWarp::arguments(&native);
        assert!(!args.iter().any(|a| a == "-ts" || a == "-tr" || a == "-te" || a == "-t_srs"));
    }
}
