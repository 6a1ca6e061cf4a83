//! Progress reporting abstraction
//!
//! Decouples collection logic from UI concerns (indicatif).

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Receives human-readable status lines at coarse milestones
pub trait Progress: Send + Sync {
    fn message(&self, msg: &str);

    /// Called once the whole operation is over
    fn finish(&self) {}
}

impl<F> Progress for F
where
    F: Fn(&str) + Send + Sync,
{
    fn message(&self, msg: &str) {
        self(msg)
    }
}

/// No-op progress for benchmarks and quiet mode
pub struct NoopProgress;

impl Progress for NoopProgress {
    fn message(&self, _msg: &str) {}
}

/// Indicatif spinner for CLI usage; each message is also kept as a log line
pub struct SpinnerProgress(ProgressBar);

impl SpinnerProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Self(pb)
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for SpinnerProgress {
    fn message(&self, msg: &str) {
        self.0.println(msg);
        self.0.set_message(msg.to_string());
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

/// Progress that only shows output when verbose
pub struct VerboseProgress {
    inner: Option<SpinnerProgress>,
}

impl VerboseProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            inner: verbose.then(SpinnerProgress::new),
        }
    }
}

impl Progress for VerboseProgress {
    fn message(&self, msg: &str) {
        if let Some(spinner) = &self.inner {
            spinner.message(msg);
        }
    }

    fn finish(&self) {
        if let Some(spinner) = &self.inner {
            spinner.finish();
        }
    }
}

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Progress for RecordingProgress {
    fn message(&self, msg: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(msg.to_string());
        }
    }
}
