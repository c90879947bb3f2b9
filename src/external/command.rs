//! Synchronous execution of external command line tools under a timeout

use std::fmt;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, log, warn, Level};

use crate::utils::progress::ProgressTracker;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished tool
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Failures to run a tool at all
#[derive(Debug)]
pub enum ToolError {
    /// The executable could not be started
    Spawn { program: String, source: io::Error },
    /// The tool exceeded its time budget and was killed
    TimedOut { program: String, timeout: Duration },
    /// Waiting on the child failed
    Io(io::Error),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Spawn { program, source } => write!(f, "Failed to start {}: {}", program, source),
            ToolError::TimedOut { program, timeout } => {
                write!(f, "{} did not finish within {} seconds", program, timeout.as_secs())
            }
            ToolError::Io(e) => write!(f, "I/O error while waiting for tool: {}", e),
        }
    }
}

impl std::error::Error for ToolError {}

/// Runs tools, logging their output, and enforces the per-call timeout
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    show_progress: bool,
}

impl CommandRunner {
    /// Create a runner
    ///
    /// # Arguments
    /// * `show_progress` - Show a console spinner while the tool runs
    pub fn new(show_progress: bool) -> Self {
        CommandRunner { show_progress }
    }

    /// Run `program` with `args`, killing it once `timeout` has elapsed
    pub fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput, ToolError> {
        info!("Executing {} ({} arguments)", program, args.len());
        debug!("{} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn { program: program.to_string(), source })?;

        // Drain both pipes concurrently so a chatty tool never blocks on a full pipe
        let stdout_reader = child.stdout.take().map(|pipe| thread::spawn(move || read_all(pipe)));
        let stderr_reader = child.stderr.take().map(|pipe| thread::spawn(move || read_all(pipe)));

        let spinner = if self.show_progress {
            Some(ProgressTracker::spinner(&format!("Running {}", tool_name(program))))
        } else {
            None
        };

        let started = Instant::now();
        let status = loop {
            match child.try_wait().map_err(ToolError::Io)? {
                Some(status) => break Some(status),
                None if started.elapsed() >= timeout => {
                    warn!("{} exceeded its {}s timeout, killing it", program, timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = stdout_reader.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr_reader.and_then(|h| h.join().ok()).unwrap_or_default();
        let succeeded = status.map_or(false, |s| s.success());
        log_lines(tool_name(program), "stdout", &stdout, Level::Debug);
        log_lines(tool_name(program), "stderr", &stderr, stderr_level(succeeded));

        match status {
            None => {
                if let Some(spinner) = &spinner {
                    spinner.abandon("timed out");
                }
                Err(ToolError::TimedOut { program: program.to_string(), timeout })
            }
            Some(status) => {
                if let Some(spinner) = &spinner {
                    spinner.finish(if status.success() { "done" } else { "failed" });
                }
                info!("{} finished with {} after {:.1}s", tool_name(program), status, started.elapsed().as_secs_f64());
                Ok(CommandOutput { status: status.code(), stdout, stderr })
            }
        }
    }
}

fn read_all<R: Read>(mut pipe: R) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Stderr of a failed or killed tool is surfaced at warning level
fn stderr_level(succeeded: bool) -> Level {
    if succeeded {
        Level::Debug
    } else {
        Level::Warn
    }
}

fn log_lines(tool: &str, stream: &str, text: &str, level: Level) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        log!(level, "[{} {}] {}", tool, stream, line);
    }
}

fn tool_name(program: &str) -> &str {
    program.rsplit(['/', '\\']).next().unwrap_or(program)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_status() {
        let runner = CommandRunner::new(false);
        let output = runner
            .run("sh", &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()], Duration::from_secs(10))
            .unwrap();
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_timeout_kills_tool() {
        let runner = CommandRunner::new(false);
        let started = Instant::now();
        let result = runner.run("sleep", &["5".to_string()], Duration::from_millis(200));
        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let runner = CommandRunner::new(false);
        let result = runner.run("/nonexistent/tool", &[], Duration::from_secs(1));
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn test_stderr_level_follows_exit_status() {
        assert_eq!(stderr_level(true), Level::Debug);
        assert_eq!(stderr_level(false), Level::Warn);

        let runner = CommandRunner::new(false);
        let output = runner
            .run("sh", &["-c".to_string(), "echo broken >&2; exit 1".to_string()], Duration::from_secs(10))
            .unwrap();
        assert_eq!(stderr_level(output.success()), Level::Warn);
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[test]
    fn test_tool_name() {
        assert_eq!(tool_name("/usr/bin/gdalwarp"), "gdalwarp");
        assert_eq!(tool_name("kdu_compress"), "kdu_compress");
    }
}
