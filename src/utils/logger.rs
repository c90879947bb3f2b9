//! Service logging
//!
//! Log records go to the service log file, opened in append mode so that
//! successive requests share one log. Without a configured log file the
//! `env_logger` backend is installed instead.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use log::{Log, Record, Level, Metadata, LevelFilter};

/// File logger for the `log` facade
pub struct Logger {
    /// File handle for log output
    file: Mutex<Option<File>>,
    level: Level,
    /// Echo records to stderr as well
    echo: bool,
}

impl Logger {
    /// Opens (or creates) the log file for appending
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path to the log file
    /// * `verbose` - Record debug messages and echo everything to stderr
    ///
    /// # Returns
    ///
    /// A new Logger instance or an error if the file cannot be opened
    pub fn new(log_file: &str, verbose: bool) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(Path::new(log_file))?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            level: if verbose { Level::Debug } else { Level::Info },
            echo: verbose,
        })
    }

    /// Appends one line to the log file
    pub fn write_line(&self, message: &str) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Installs the global logger
    ///
    /// Uses the file logger when `log_file` is set and `env_logger` otherwise.
    pub fn init_global_logger(log_file: Option<&str>, verbose: bool) -> io::Result<()> {
        let filter = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

        match log_file {
            Some(path) => {
                let global_logger = Logger::new(path, verbose)?;
                if log::set_boxed_logger(Box::new(global_logger)).is_err() {
                    eprintln!("Warning: Global logger was already initialized");
                }
                log::set_max_level(filter);
            }
            None => {
                let _ = env_logger::Builder::from_default_env()
                    .filter_level(filter)
                    .target(env_logger::Target::Stderr)
                    .try_init();
            }
        }
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}: {}", record.level(), record.target(), record.args());
            let _ = self.write_line(&message);

            if self.echo || record.level() <= Level::Warn {
                eprintln!("{}", message);
            }
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wcs.log");
        std::fs::write(&path, "earlier request\n").unwrap();

        let logger = Logger::new(path.to_str().unwrap(), false).unwrap();
        logger.write_line("GetCoverage MOD_Grid").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "earlier request\nGetCoverage MOD_Grid\n");
    }

    #[test]
    fn test_level_filter() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path().join("a.log").to_str().unwrap(), false).unwrap();
        let debug = Metadata::builder().level(Level::Debug).build();
        let warn = Metadata::builder().level(Level::Warn).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&warn));
    }
}
