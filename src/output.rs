//! Result types: per-file outcomes and the batch summary.

use crate::error::{FileError, Md2PdfError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Status of one input file within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Not processed (the run was cancelled before reaching it).
    Pending,
    Succeeded,
    Failed,
}

/// Final record for one input file.
///
/// Constructed only through [`succeeded`](Self::succeeded),
/// [`failed`](Self::failed) and [`pending`](Self::pending), which keep
/// `error` present exactly when `status` is [`FileStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConversionOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
    /// Wall-clock time spent on this file.
    pub duration_ms: u64,
}

impl FileConversionOutcome {
    pub fn succeeded(source: PathBuf, output: PathBuf, duration_ms: u64) -> Self {
        Self {
            source,
            output,
            status: FileStatus::Succeeded,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(source: PathBuf, output: PathBuf, error: FileError, duration_ms: u64) -> Self {
        Self {
            source,
            output,
            status: FileStatus::Failed,
            error: Some(error),
            duration_ms,
        }
    }

    pub fn pending(source: PathBuf, output: PathBuf) -> Self {
        Self {
            source,
            output,
            status: FileStatus::Pending,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Succeeded
    }

    /// File name of the source, for log lines.
    pub fn source_name(&self) -> String {
        display_name(&self.source)
    }

    /// One human-readable line naming the file and how it ended.
    pub fn summary_line(&self) -> String {
        match (&self.status, &self.error) {
            (FileStatus::Succeeded, _) => format!(
                "✓ {} → {} ({} ms)",
                self.source_name(),
                display_name(&self.output),
                self.duration_ms
            ),
            (FileStatus::Failed, Some(e)) => format!("✗ {}: {}", self.source_name(), e),
            (FileStatus::Failed, None) => format!("✗ {}", self.source_name()),
            (FileStatus::Pending, _) => format!("- {}: not converted", self.source_name()),
        }
    }
}

/// Everything a finished (or cancelled) batch produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// One entry per input, in input order.
    pub outcomes: Vec<FileConversionOutcome>,
    /// Set when the run stopped early on a cancellation request.
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(FileStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    pub fn pending(&self) -> usize {
        self.count(FileStatus::Pending)
    }

    fn count(&self, status: FileStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Treat any failed file as an error.
    ///
    /// A completed batch is not an all-clear: callers that need pass/fail
    /// semantics (the CLI exit code, scripts) go through this.
    pub fn into_result(self) -> Result<Self, Md2PdfError> {
        let failed = self.failed();
        if failed == 0 {
            Ok(self)
        } else {
            Err(Md2PdfError::PartialFailure {
                succeeded: self.succeeded(),
                failed,
                total: self.total(),
            })
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
