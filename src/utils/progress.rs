use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Console spinner shown while a long-running external tool works
///
/// indicatif draws to stderr and hides itself when stderr is not a terminal,
/// so responses written to stdout are never interleaved with progress output.
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    pub fn spinner(description: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message(description.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        ProgressTracker { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}
