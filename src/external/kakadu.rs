use log::error;

use super::command::CommandRunner;
use super::{CompressJob, Compressor};
use crate::errors::{WcsError, WcsResult};

const FAILURE_MESSAGE: &str = "Failed to execute the Kakadu command line in the back end.";

/// [`Compressor`] backed by Kakadu's `kdu_compress`
pub struct KakaduCompressor {
    program: String,
    runner: CommandRunner,
}

impl KakaduCompressor {
    pub fn new(program: &str, runner: CommandRunner) -> Self {
        KakaduCompressor { program: program.to_string(), runner }
    }

    /// `-i <src> -o <dst> [-jp2_box <side>] <parameters...>`
    pub fn arguments(job: &CompressJob) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            job.source.to_string_lossy().into_owned(),
            "-o".to_string(),
            job.destination.to_string_lossy().into_owned(),
        ];
        if let Some(side_file) = &job.side_file {
            args.push("-jp2_box".to_string());
            args.push(side_file.to_string_lossy().into_owned());
        }
        args.extend(job.parameters.iter().cloned());
        args
    }
}

impl Compressor for KakaduCompressor {
    fn compress(&self, job: &CompressJob) -> WcsResult<()> {
        let args = Self::arguments(job);
        let output = self.runner.run(&self.program, &args, job.timeout).map_err(|e| {
            error!("kdu_compress could not run: {}", e);
            WcsError::no_applicable("KakaduCompressor", format!("{} {}", FAILURE_MESSAGE, e))
        })?;

        if !output.success() {
            error!("kdu_compress failed ({:?}): {}", output.status, output.stderr.trim());
            return Err(WcsError::no_applicable("KakaduCompressor", FAILURE_MESSAGE));
        }
        Ok(())
    }
}
