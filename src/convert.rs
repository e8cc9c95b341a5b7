//! Conversion entry points: one file ([`ConversionJob`]) and a whole batch
//! ([`BatchConversionController`]).
//!
//! ## Failure isolation
//!
//! Only two things stop a batch before it starts: an engine that fails its
//! self-check, and an output directory that cannot be created. Everything
//! that goes wrong with an individual file (unreadable source, engine error,
//! timeout) becomes a [`FileError`] in that file's outcome and the loop moves
//! on. Files run strictly one at a time; the engine is a heavyweight process
//! and serial runs keep the output directory free of races.

use crate::config::{ConversionRequest, OutputTarget, PageLayout};
use crate::error::{CleanupWarning, FileError, Md2PdfError};
use crate::output::{display_name, BatchSummary, FileConversionOutcome};
use crate::pipeline::document::{DocumentRenderer, RenderedDocument};
use crate::pipeline::engine::PdfEngine;
use crate::pipeline::input::{plan_output_paths, read_markdown};
use crate::pipeline::options::build_render_options;
use crate::progress::{BatchObserver, CancelFlag, NoopObserver, ProgressTracker};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

// ── Job state machine ────────────────────────────────────────────────────────

/// Lifecycle of one [`ConversionJob`].
///
/// ```text
/// Created → Reading → Rendering → Invoking → CleaningUp → Succeeded
///              │                      │           │
///              └──────────────────────┴──────────►└──────► Failed
/// ```
///
/// `CleaningUp` is visited on every path, including a failed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Created,
    Reading,
    Rendering,
    Invoking,
    CleaningUp,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::Reading => "reading",
            JobState::Rendering => "rendering",
            JobState::Invoking => "invoking",
            JobState::CleaningUp => "cleaning-up",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Converts a single Markdown file to PDF.
#[derive(Debug)]
pub struct ConversionJob {
    /// 1-indexed position in the batch; keeps temp file names distinct.
    index: usize,
    source: PathBuf,
    output: PathBuf,
    state: JobState,
    history: Vec<JobState>,
}

impl ConversionJob {
    pub fn new(index: usize, source: PathBuf, output: PathBuf) -> Self {
        Self {
            index,
            source,
            output,
            state: JobState::Created,
            history: vec![JobState::Created],
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Drive the job to a terminal state. Never returns an error: failures are
    /// recorded in the outcome.
    pub async fn run<E: PdfEngine>(
        &mut self,
        engine: &E,
        renderer: &DocumentRenderer,
        layout: &PageLayout,
        timeout: Duration,
    ) -> FileConversionOutcome {
        let started = Instant::now();
        let result = self.execute(engine, renderer, layout, timeout).await;
        let elapsed = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(()) => {
                self.transition(JobState::Succeeded);
                FileConversionOutcome::succeeded(self.source.clone(), self.output.clone(), elapsed)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                warn!(kind = e.kind(), "{}", e);
                FileConversionOutcome::failed(self.source.clone(), self.output.clone(), e, elapsed)
            }
        };
        info!("{}", outcome.summary_line());
        outcome
    }

    async fn execute<E: PdfEngine>(
        &mut self,
        engine: &E,
        renderer: &DocumentRenderer,
        layout: &PageLayout,
        timeout: Duration,
    ) -> Result<(), FileError> {
        self.transition(JobState::Reading);
        let markdown = match read_markdown(&self.source).await {
            Ok(m) => m,
            Err(e) => {
                self.transition(JobState::CleaningUp);
                return Err(e);
            }
        };

        self.transition(JobState::Rendering);
        let doc = renderer.render_document(&markdown, layout.header_text(), layout.footer_text());

        self.transition(JobState::Invoking);
        let mut fragments = Vec::new();
        let result = self
            .invoke(engine, &doc, layout, timeout, &mut fragments)
            .await;

        self.transition(JobState::CleaningUp);
        for warning in remove_fragments(fragments) {
            warn!("{}", warning);
        }
        result
    }

    async fn invoke<E: PdfEngine>(
        &self,
        engine: &E,
        doc: &RenderedDocument,
        layout: &PageLayout,
        timeout: Duration,
        fragments: &mut Vec<NamedTempFile>,
    ) -> Result<(), FileError> {
        self.remove_stale_output().await?;
        let header = match &doc.header_html {
            Some(html) => Some(self.write_fragment("header", html, fragments)?),
            None => None,
        };
        let footer = match &doc.footer_html {
            Some(html) => Some(self.write_fragment("footer", html, fragments)?),
            None => None,
        };
        let options = build_render_options(layout, header.as_deref(), footer.as_deref());

        match tokio::time::timeout(timeout, engine.render(&doc.body_html, &options, &self.output))
            .await
        {
            Err(_) => Err(FileError::Timeout {
                file: self.file_name(),
                secs: timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(FileError::Render {
                file: self.file_name(),
                detail: e.to_string(),
            }),
            Ok(Ok(())) => self.verify_output().await,
        }
    }

    /// Write a header/footer fragment to a uniquely named temp file.
    fn write_fragment(
        &self,
        kind: &str,
        html: &str,
        fragments: &mut Vec<NamedTempFile>,
    ) -> Result<PathBuf, FileError> {
        let prefix = format!("{kind}_temp_{}_", self.index);
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".html")
            .tempfile()
            .map_err(|e| self.render_error(format!("cannot create {kind} fragment: {e}")))?;
        let path = file.path().to_path_buf();
        // Registered before writing so a failed write is still cleaned up.
        let written = file.write_all(html.as_bytes()).and_then(|_| file.flush());
        fragments.push(file);
        written.map_err(|e| self.render_error(format!("cannot write {kind} fragment: {e}")))?;
        debug!("Wrote {} fragment {}", kind, path.display());
        Ok(path)
    }

    /// A PDF left by an earlier run must not pass for this job's output.
    async fn remove_stale_output(&self) -> Result<(), FileError> {
        match tokio::fs::remove_file(&self.output).await {
            Ok(()) => {
                debug!("Removed previous {}", self.output.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.render_error(format!(
                "cannot replace existing '{}': {e}",
                self.output.display()
            ))),
        }
    }

    async fn verify_output(&self) -> Result<(), FileError> {
        match tokio::fs::metadata(&self.output).await {
            Ok(m) if m.len() > 0 => Ok(()),
            Ok(_) => Err(self.render_error(format!(
                "engine reported success but '{}' is empty",
                self.output.display()
            ))),
            Err(e) => Err(self.render_error(format!(
                "engine reported success but '{}' is missing: {e}",
                self.output.display()
            ))),
        }
    }

    fn render_error(&self, detail: String) -> FileError {
        FileError::Render {
            file: self.file_name(),
            detail,
        }
    }

    fn file_name(&self) -> String {
        display_name(&self.source)
    }

    fn transition(&mut self, next: JobState) {
        debug!(
            file = %self.source.display(),
            from = %self.state,
            to = %next,
            "job transition"
        );
        self.state = next;
        self.history.push(next);
    }
}

/// Delete fragment files, collecting what could not be removed.
fn remove_fragments(fragments: Vec<NamedTempFile>) -> Vec<CleanupWarning> {
    fragments
        .into_iter()
        .filter_map(|f| {
            let path = f.path().to_path_buf();
            f.close().err().map(|source| CleanupWarning { path, source })
        })
        .collect()
}

// ── Batch controller ─────────────────────────────────────────────────────────

/// Runs a [`ConversionRequest`] file by file.
///
/// The engine is held behind an `Arc` so one resolved engine can be shared by
/// consecutive runs and moved into a background task by
/// [`crate::stream::spawn_batch`]. The controller keeps no per-run state:
/// cancellation is scoped to a single call of [`Self::run_until_cancelled`].
pub struct BatchConversionController<E: PdfEngine> {
    engine: Arc<E>,
    renderer: DocumentRenderer,
}

impl<E: PdfEngine> BatchConversionController<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            renderer: DocumentRenderer::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: DocumentRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the batch to the end.
    ///
    /// # Returns
    /// `Ok(BatchSummary)` whenever the batch got past its pre-checks, even if
    /// every file failed (check [`BatchSummary::failed`] or use
    /// [`BatchSummary::into_result`]).
    ///
    /// # Errors
    /// Only fatal pre-check failures, each preceded by exactly one
    /// `on_fatal_error` event: invalid request, engine unavailable, output
    /// directory not creatable.
    pub async fn run(
        &self,
        request: &ConversionRequest,
        observer: &dyn BatchObserver,
    ) -> Result<BatchSummary, Md2PdfError> {
        self.run_until_cancelled(request, observer, &CancelFlag::new())
            .await
    }

    /// Like [`Self::run`], but stops before the next file once `cancel` is
    /// set. Files not reached are reported as pending.
    pub async fn run_until_cancelled(
        &self,
        request: &ConversionRequest,
        observer: &dyn BatchObserver,
        cancel: &CancelFlag,
    ) -> Result<BatchSummary, Md2PdfError> {
        let started = Instant::now();
        let total = request.inputs.len();

        // ── Pre-checks ───────────────────────────────────────────────────
        if let Err(e) = request.validate() {
            return Err(fatal(observer, e));
        }

        match self.engine.self_check().await {
            Ok(version) => debug!("Engine version: {}", version),
            Err(e) => return Err(fatal(observer, e)),
        }

        let out_dir = request.output_dir();
        if let Err(source) = tokio::fs::create_dir_all(out_dir).await {
            let e = Md2PdfError::OutputDirUnavailable {
                path: out_dir.to_path_buf(),
                source,
            };
            return Err(fatal(observer, e));
        }

        let outputs = match &request.output {
            OutputTarget::Directory(dir) => plan_output_paths(&request.inputs, dir),
            OutputTarget::File(file) => vec![file.clone()],
        };

        // ── Files ────────────────────────────────────────────────────────
        info!("Converting {} file(s) into {}", total, out_dir.display());
        observer.on_batch_start(total);
        observer.on_progress(0);
        observer.on_log(&format!(
            "Converting {} file(s) into {}",
            total,
            out_dir.display()
        ));

        let timeout = Duration::from_secs(request.engine_timeout_secs);
        let mut tracker = ProgressTracker::new(total);
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        for (i, (source, output)) in request.inputs.iter().zip(&outputs).enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let index = i + 1;
            observer.on_file_start(index, total, source);

            let mut job = ConversionJob::new(index, source.clone(), output.clone());
            let outcome = job
                .run(self.engine.as_ref(), &self.renderer, &request.layout, timeout)
                .await;

            observer.on_log(&outcome.summary_line());
            outcomes.push(outcome);
            observer.on_progress(tracker.advance());
        }

        if cancelled {
            let done = outcomes.len();
            warn!("Batch cancelled after {} of {} files", done, total);
            observer.on_log(&format!("Cancelled after {done} of {total} file(s)"));
            for (source, output) in request.inputs.iter().zip(&outputs).skip(done) {
                outcomes.push(FileConversionOutcome::pending(source.clone(), output.clone()));
            }
        }

        let summary = BatchSummary {
            outcomes,
            cancelled,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let finished = format!(
            "Finished: {} succeeded, {} failed, {} not converted ({} ms)",
            summary.succeeded(),
            summary.failed(),
            summary.pending(),
            summary.duration_ms
        );
        info!("{}", finished);
        observer.on_log(&finished);
        observer.on_completed(&summary);
        Ok(summary)
    }
}

fn fatal(observer: &dyn BatchObserver, e: Md2PdfError) -> Md2PdfError {
    warn!("Batch cannot start: {}", e);
    observer.on_fatal_error(&e.to_string());
    e
}

/// Convert one Markdown file.
///
/// `output` defaults to the input path with a `.pdf` extension. The engine
/// self-check still runs first, so a missing engine is an `Err` rather than a
/// failed outcome.
pub async fn convert_file<E: PdfEngine>(
    engine: Arc<E>,
    input: impl Into<PathBuf>,
    output: Option<PathBuf>,
    layout: PageLayout,
) -> Result<FileConversionOutcome, Md2PdfError> {
    let input = input.into();
    let output = output.unwrap_or_else(|| input.with_extension("pdf"));
    let request = ConversionRequest::builder()
        .input(input)
        .output_file(output)
        .layout(layout)
        .build()?;

    let summary = BatchConversionController::new(engine)
        .run(&request, &NoopObserver)
        .await?;
    summary
        .outcomes
        .into_iter()
        .next()
        .ok_or_else(|| Md2PdfError::Internal("single-file batch produced no outcome".into()))
}
