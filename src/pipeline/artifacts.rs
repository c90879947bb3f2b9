//! Temporary files of one extraction
//!
//! All intermediate names derive from the final output path. The guard removes
//! every intermediate when dropped, and the final artifact too unless it was
//! kept.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

const MATERIALIZED_SUFFIX: &str = ".tmp.tif";
const WARPED_SUFFIX: &str = ".tmp.warp.tif";
const SIDE_FILE_SUFFIX: &str = ".txt";

/// Unique output path in `directory` for a coverage
pub fn unique_output_path(directory: &Path, coverage_id: &str, suffix: &str) -> PathBuf {
    let sanitized: String = coverage_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    let stem = sanitized.trim_matches('_');
    let stem = if stem.is_empty() { "coverage" } else { stem };
    directory.join(format!("{}_{}{}", stem, Uuid::new_v4().simple(), suffix))
}

/// Removal guard for the files of one request
#[derive(Debug)]
pub struct TempArtifacts {
    output: PathBuf,
    intermediates: Vec<PathBuf>,
    keep_output: bool,
}

impl TempArtifacts {
    pub fn new(output: PathBuf) -> Self {
        TempArtifacts { output, intermediates: Vec::new(), keep_output: false }
    }

    /// Path of the final artifact
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// `<out>.tmp.tif`, the materialized single-file copy
    pub fn materialized(&mut self) -> PathBuf {
        self.intermediate(MATERIALIZED_SUFFIX)
    }

    /// `<out>.tmp.warp.tif`, the resampler output
    pub fn warped(&mut self) -> PathBuf {
        self.intermediate(WARPED_SUFFIX)
    }

    /// `<out>.txt`, the metadata box handed to the compressor
    pub fn side_file(&mut self) -> PathBuf {
        self.intermediate(SIDE_FILE_SUFFIX)
    }

    /// Leave the final artifact in place on drop
    pub fn keep_output(&mut self) {
        self.keep_output = true;
    }

    fn intermediate(&mut self, suffix: &str) -> PathBuf {
        let mut name = self.output.clone().into_os_string();
        name.push(suffix);
        let path = PathBuf::from(name);
        if !self.intermediates.contains(&path) {
            self.intermediates.push(path.clone());
        }
        path
    }

    /// Remove intermediates and, unless kept, the final artifact
    pub fn cleanup(&mut self) {
        let mut doomed: Vec<PathBuf> = self.intermediates.drain(..).collect();
        if !self.keep_output {
            doomed.push(self.output.clone());
        }
        for path in doomed {
            if !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}
