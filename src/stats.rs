//! Batch result statistics.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A link that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLink {
    pub link: String,
    pub message: String,
}

/// Outcome of one submitted batch of links.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Paths of the payloads that were saved.
    pub saved: Vec<PathBuf>,
    /// Links that failed, with their messages.
    pub failed: Vec<FailedLink>,
    /// Total bytes saved.
    pub total_bytes: u64,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

impl BatchSummary {
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.saved.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// True when every link completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns the average save rate in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Builder for accumulating batch statistics as links finish.
pub struct BatchSummaryBuilder {
    saved: Vec<PathBuf>,
    failed: Vec<FailedLink>,
    total_bytes: u64,
    start_time: Instant,
}

impl Default for BatchSummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSummaryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            saved: Vec::new(),
            failed: Vec::new(),
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }

    /// Records a saved payload.
    pub fn add_saved(&mut self, path: PathBuf, bytes: u64) {
        self.saved.push(path);
        self.total_bytes += bytes;
    }

    /// Records a failed link.
    pub fn add_failed(&mut self, link: &str, message: &str) {
        self.failed.push(FailedLink {
            link: link.to_string(),
            message: message.to_string(),
        });
    }

    #[must_use]
    pub fn build(self) -> BatchSummary {
        BatchSummary {
            saved: self.saved,
            failed: self.failed,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
        }
    }
}
