//! Batch event observer, progress arithmetic, and cooperative cancellation.
//!
//! Attach an [`Arc<dyn BatchObserver>`] (or any `&dyn BatchObserver`) to
//! [`crate::convert::BatchConversionController::run`] to receive events as
//! the batch proceeds. [`crate::stream::spawn_batch`] wraps the same events
//! into an async `Stream` for callers that prefer channels.
//!
//! # Ordering
//!
//! Events for one batch are delivered from a single task in the exact order
//! files are processed. Exactly one terminal event ends a run:
//! [`BatchObserver::on_completed`] or [`BatchObserver::on_fatal_error`].
//!
//! # Example
//!
//! ```rust
//! use md2pdf::BatchObserver;
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct LastPercent(Mutex<u8>);
//!
//! impl BatchObserver for LastPercent {
//!     fn on_progress(&self, percent: u8) {
//!         *self.0.lock().unwrap() = percent;
//!     }
//! }
//! ```

use crate::output::BatchSummary;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives batch events.
///
/// Implementations must be `Send + Sync`: the batch usually runs on a
/// background Tokio task. Every method has a no-op default so callers only
/// override what they care about.
pub trait BatchObserver: Send + Sync {
    /// Called once, after the pre-checks passed and before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before each file is processed.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the batch
    /// * `total` — number of files in the batch
    /// * `source` — the input path
    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Aggregate progress, 0..=100, monotonically non-decreasing.
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// One human-readable log line.
    fn on_log(&self, line: &str) {
        let _ = line;
    }

    /// Terminal: the batch ran to the end (or was cancelled), whatever the
    /// per-file outcomes were.
    fn on_completed(&self, summary: &BatchSummary) {
        let _ = summary;
    }

    /// Terminal: the batch could not start.
    fn on_fatal_error(&self, message: &str) {
        let _ = message;
    }
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Convenience alias for shared observers.
pub type SharedObserver = Arc<dyn BatchObserver>;

// ── Progress arithmetic ──────────────────────────────────────────────────

/// Turns "files done" into a percentage that never decreases and only reads
/// 100 once every file is terminal.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    done: usize,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            last: 0,
        }
    }

    /// Record one more finished file and return the percentage to report.
    pub fn advance(&mut self) -> u8 {
        self.done = (self.done + 1).min(self.total);
        self.last = self.last.max(self.percent());
        self.last
    }

    /// Current percentage without advancing.
    pub fn current(&self) -> u8 {
        self.last
    }

    pub fn is_finished(&self) -> bool {
        self.done >= self.total
    }

    fn percent(&self) -> u8 {
        if self.total == 0 || self.done >= self.total {
            return 100;
        }
        let rounded = ((self.done as f64 / self.total as f64) * 100.0).round() as u8;
        // 199/200 rounds to 100 without being done.
        rounded.min(99)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag checked by the controller between files.
///
/// Cloning yields a handle to the same flag. Cancelling never interrupts a
/// file already in progress; the current job finishes (or times out) and the
/// remaining files are left pending.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
