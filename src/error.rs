//! Error types for the md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] — **Fatal**: the run cannot proceed at all (engine
//!   missing, output directory not creatable, invalid request). Returned as
//!   `Err(Md2PdfError)` and, for a batch, announced with a single
//!   `fatal_error` event before any file is touched.
//!
//! * [`FileError`] — **Non-fatal**: one input failed (unreadable, engine
//!   failure, timeout) but every other file still gets its turn. Stored inside
//!   [`crate::output::FileConversionOutcome`] so callers can tally partial
//!   success instead of losing the batch to one bad file.
//!
//! [`EngineError`] is the narrow vocabulary of the process boundary; the job
//! turns it into a [`FileError`] that carries the file name.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Environment errors ───────────────────────────────────────────────
    /// The HTML-to-PDF engine is missing or failed its self-check.
    #[error("wkhtmltopdf is not usable at '{path}': {reason}\n\n{guidance}")]
    EngineUnavailable {
        path: PathBuf,
        reason: String,
        guidance: &'static str,
    },

    /// The output directory does not exist and could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// A path given on the command line does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// A directory was given but contains no Markdown files.
    #[error("No Markdown files (*.md, *.markdown) found under '{dir}'")]
    NoMarkdownFiles { dir: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Outcome errors ────────────────────────────────────────────────────
    /// The batch completed but at least one file failed.
    ///
    /// Returned by [`crate::output::BatchSummary::into_result`] when the
    /// caller wants to treat any file failure as an error.
    #[error("{failed}/{total} files failed to convert")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Source missing, unreadable, or not valid UTF-8.
    #[error("cannot read '{file}': {detail}")]
    Read { file: String, detail: String },

    /// The engine failed or left no usable PDF behind.
    #[error("rendering '{file}' failed: {detail}")]
    Render { file: String, detail: String },

    /// The engine did not finish within the configured bound.
    #[error("rendering '{file}' timed out after {secs}s")]
    Timeout { file: String, secs: u64 },
}

impl FileError {
    /// Short machine-friendly kind, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Read { .. } => "read",
            FileError::Render { .. } => "render",
            FileError::Timeout { .. } => "timeout",
        }
    }
}

/// Failure reported by a [`crate::pipeline::engine::PdfEngine`] invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the process or feeding it the document failed.
    #[error("I/O error talking to the engine: {0}")]
    Io(#[from] std::io::Error),

    /// The engine exited unsuccessfully.
    #[error("engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// A temporary artifact that could not be removed. Logged, never escalated.
#[derive(Debug, Error)]
#[error("could not remove temporary file '{path}': {source}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = Md2PdfError::PartialFailure {
            succeeded: 2,
            failed: 1,
            total: 3,
        };
        assert!(e.to_string().contains("1/3"), "got: {e}");
    }

    #[test]
    fn engine_unavailable_includes_guidance() {
        let e = Md2PdfError::EngineUnavailable {
            path: PathBuf::from("/opt/wk/wkhtmltopdf"),
            reason: "No such file or directory".into(),
            guidance: wkhtmltopdf_locate::INSTALL_GUIDANCE,
        };
        let msg = e.to_string();
        assert!(msg.contains("/opt/wk/wkhtmltopdf"));
        assert!(msg.contains(wkhtmltopdf_locate::DOWNLOAD_URL));
    }

    #[test]
    fn file_errors_name_the_file() {
        let read = FileError::Read {
            file: "notes.md".into(),
            detail: "permission denied".into(),
        };
        let timeout = FileError::Timeout {
            file: "big.md".into(),
            secs: 60,
        };
        assert!(read.to_string().contains("notes.md"));
        assert!(read.to_string().contains("permission denied"));
        assert!(timeout.to_string().contains("big.md"));
        assert!(timeout.to_string().contains("60s"));
        assert_eq!(read.kind(), "read");
        assert_eq!(timeout.kind(), "timeout");
    }

    #[test]
    fn file_error_serialises() {
        let e = FileError::Render {
            file: "a.md".into(),
            detail: "exit status 1".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("Render"));
        let back: FileError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn engine_failed_display() {
        let e = EngineError::Failed {
            status: "exit status: 1".into(),
            stderr: "Exit with code 1 due to network error".into(),
        };
        assert!(e.to_string().contains("network error"));
    }
}
