//! Background batches with an event stream.
//!
//! ## Why a stream?
//!
//! A batch over a large folder takes minutes. [`spawn_batch`] moves the run
//! onto its own Tokio task and hands back a [`BatchEventStream`], so a UI (the
//! CLI's progress bar, a web socket, a test) can react to each event as it
//! happens while the worker keeps going. The foreground never blocks on
//! conversion.
//!
//! Events arrive in the order the worker produced them, and the last event is
//! always [`BatchEvent::Completed`] or [`BatchEvent::FatalError`].

use crate::config::ConversionRequest;
use crate::convert::BatchConversionController;
use crate::error::Md2PdfError;
use crate::output::BatchSummary;
use crate::pipeline::engine::PdfEngine;
use crate::progress::{BatchObserver, CancelFlag};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// One observable step of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    BatchStarted {
        total: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        source: PathBuf,
    },
    Progress {
        percent: u8,
    },
    Log {
        line: String,
    },
    Completed {
        summary: BatchSummary,
    },
    FatalError {
        message: String,
    },
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Completed { .. } | BatchEvent::FatalError { .. })
    }
}

/// A boxed stream of batch events.
pub type BatchEventStream = Pin<Box<dyn Stream<Item = BatchEvent> + Send>>;

/// Observer that forwards every callback into a channel.
///
/// Sends never block; if the receiver is gone the events are dropped and the
/// batch carries on.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<BatchEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: BatchEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

impl BatchObserver for ChannelObserver {
    fn on_batch_start(&self, total_files: usize) {
        self.send(BatchEvent::BatchStarted { total: total_files });
    }

    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        self.send(BatchEvent::FileStarted {
            index,
            total,
            source: source.to_path_buf(),
        });
    }

    fn on_progress(&self, percent: u8) {
        self.send(BatchEvent::Progress { percent });
    }

    fn on_log(&self, line: &str) {
        self.send(BatchEvent::Log {
            line: line.to_string(),
        });
    }

    fn on_completed(&self, summary: &BatchSummary) {
        self.send(BatchEvent::Completed {
            summary: summary.clone(),
        });
    }

    fn on_fatal_error(&self, message: &str) {
        self.send(BatchEvent::FatalError {
            message: message.to_string(),
        });
    }
}

/// A batch running on a background task.
pub struct BatchHandle {
    /// Events in production order; ends after the terminal event.
    pub events: BatchEventStream,
    /// Stops this batch before its next file.
    pub cancel: CancelFlag,
    /// Resolves to the same result the controller returned.
    pub task: JoinHandle<Result<BatchSummary, Md2PdfError>>,
}

impl BatchHandle {
    /// Wait for the worker, mapping a panicked task to an internal error.
    pub async fn join(self) -> Result<BatchSummary, Md2PdfError> {
        self.task
            .await
            .map_err(|e| Md2PdfError::Internal(format!("Batch task failed: {}", e)))?
    }
}

/// Start `request` on a background task.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_batch<E>(
    controller: Arc<BatchConversionController<E>>,
    request: ConversionRequest,
) -> BatchHandle
where
    E: PdfEngine + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    // Fresh per spawn: cancelling one batch never leaks into the next.
    let cancel = CancelFlag::new();
    let run_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let observer = ChannelObserver::new(tx);
        controller
            .run_until_cancelled(&request, &observer, &run_cancel)
            .await
        // observer (and the sender) dropped here: the stream ends
    });
    BatchHandle {
        events: Box::pin(UnboundedReceiverStream::new(rx)),
        cancel,
        task,
    }
}
