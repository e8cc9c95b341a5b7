//! Batch behaviour against in-process fake engines.
//!
//! Nothing here needs wkhtmltopdf: each fake implements `PdfEngine` and
//! records or misbehaves as the scenario requires.

use futures::StreamExt;
use md2pdf::pipeline::options::{OptionValue, RenderOptions};
use md2pdf::{
    spawn_batch, BatchConversionController, BatchEvent, BatchObserver, BatchSummary, CancelFlag,
    ConversionRequest, EngineError, FileError, FileStatus, Md2PdfError, NoopObserver, PdfEngine,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Writes a tiny PDF and remembers every call.
#[derive(Default)]
struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Clone)]
struct Call {
    html: String,
    output: PathBuf,
    header: Option<PathBuf>,
    header_existed: bool,
    header_html: Option<String>,
}

impl PdfEngine for RecordingEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        Ok("wkhtmltopdf 0.12.6 (fake)".into())
    }

    async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), EngineError> {
        let header = match options.get("header-html") {
            Some(OptionValue::Path(p)) => Some(p.clone()),
            _ => None,
        };
        let header_html = header.as_ref().and_then(|p| std::fs::read_to_string(p).ok());
        self.calls.lock().unwrap().push(Call {
            html: html.to_string(),
            output: output.to_path_buf(),
            header_existed: header.as_ref().map(|p| p.exists()).unwrap_or(false),
            header,
            header_html,
        });
        tokio::fs::write(output, b"%PDF-1.4\n%fake\n").await?;
        Ok(())
    }
}

impl RecordingEngine {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

/// Fails every render after checking its header fragment exists.
#[derive(Default)]
struct FailingEngine {
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl PdfEngine for FailingEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        Ok("fake".into())
    }

    async fn render(&self, _: &str, options: &RenderOptions, _: &Path) -> Result<(), EngineError> {
        for name in ["header-html", "footer-html"] {
            if let Some(OptionValue::Path(p)) = options.get(name) {
                self.seen.lock().unwrap().push((p.clone(), p.exists()));
            }
        }
        Err(EngineError::Failed {
            status: "exit status: 1".into(),
            stderr: "Exit with code 1 due to network error: ContentNotFoundError".into(),
        })
    }
}

/// Never finishes in time.
struct SlowEngine;

impl PdfEngine for SlowEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        Ok("fake".into())
    }

    async fn render(&self, _: &str, _: &RenderOptions, _: &Path) -> Result<(), EngineError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Fails its self-check; rendering must never be reached.
struct MissingEngine;

impl PdfEngine for MissingEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        Err(Md2PdfError::EngineUnavailable {
            path: PathBuf::from("/nowhere/wkhtmltopdf"),
            reason: "No such file or directory".into(),
            guidance: wkhtmltopdf_locate::INSTALL_GUIDANCE,
        })
    }

    async fn render(&self, _: &str, _: &RenderOptions, _: &Path) -> Result<(), EngineError> {
        panic!("render called after a failed self-check");
    }
}

/// Succeeds, and raises the cancel flag during its first render.
struct CancellingEngine {
    cancel: CancelFlag,
}

impl PdfEngine for CancellingEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        Ok("fake".into())
    }

    async fn render(&self, _: &str, _: &RenderOptions, output: &Path) -> Result<(), EngineError> {
        self.cancel.cancel();
        tokio::fs::write(output, b"%PDF-1.4\n").await?;
        Ok(())
    }
}

/// Collects observer callbacks as events.
#[derive(Default)]
struct Collect(Mutex<Vec<BatchEvent>>);

impl Collect {
    fn events(&self) -> Vec<BatchEvent> {
        self.0.lock().unwrap().clone()
    }
    fn push(&self, e: BatchEvent) {
        self.0.lock().unwrap().push(e);
    }
}

impl BatchObserver for Collect {
    fn on_batch_start(&self, total: usize) {
        self.push(BatchEvent::BatchStarted { total });
    }
    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        self.push(BatchEvent::FileStarted {
            index,
            total,
            source: source.to_path_buf(),
        });
    }
    fn on_progress(&self, percent: u8) {
        self.push(BatchEvent::Progress { percent });
    }
    fn on_log(&self, line: &str) {
        self.push(BatchEvent::Log { line: line.into() });
    }
    fn on_completed(&self, summary: &BatchSummary) {
        self.push(BatchEvent::Completed {
            summary: summary.clone(),
        });
    }
    fn on_fatal_error(&self, message: &str) {
        self.push(BatchEvent::FatalError {
            message: message.into(),
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let p = dir.join(name);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&p, body).unwrap();
    p
}

fn pdfs_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".pdf"))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

fn logs(events: &[BatchEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Log { line } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

fn percents(events: &[BatchEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_bad_file_does_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let inputs = vec![
        write(dir.path(), "one.md", b"# One"),
        write(dir.path(), "two.md", &[0xff, 0xfe, 0x00, 0x41]),
        write(dir.path(), "three.md", b"# Three"),
    ];
    let request = ConversionRequest::builder()
        .inputs(inputs)
        .output_dir(&out)
        .build()
        .unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let observer = Collect::default();
    let summary = assert_ok!(
        BatchConversionController::new(engine.clone())
            .run(&request, &observer)
            .await
    );

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.outcomes[1].error,
        Some(FileError::Read { .. })
    ));
    assert_eq!(pdfs_in(&out), vec!["one.pdf", "three.pdf"]);
    assert_eq!(engine.calls().len(), 2);

    let events = observer.events();
    let per_file: Vec<String> = logs(&events)
        .into_iter()
        .filter(|l| l.starts_with('✓') || l.starts_with('✗'))
        .collect();
    assert_eq!(per_file.len(), 3);
    assert!(per_file[0].starts_with("✓ one.md"));
    assert!(per_file[1].starts_with("✗ two.md"));
    assert!(per_file[2].starts_with("✓ three.md"));

    assert_eq!(percents(&events).last(), Some(&100));
    assert!(matches!(events.last(), Some(BatchEvent::Completed { .. })));

    let err = assert_err!(summary.into_result());
    assert!(matches!(
        err,
        Md2PdfError::PartialFailure {
            succeeded: 2,
            failed: 1,
            total: 3
        }
    ));
}

#[tokio::test]
async fn failed_self_check_converts_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .input(write(dir.path(), "b.md", b"# B"))
        .output_dir(&out)
        .build()
        .unwrap();

    let observer = Collect::default();
    let err = assert_err!(
        BatchConversionController::new(Arc::new(MissingEngine))
            .run(&request, &observer)
            .await
    );

    assert!(matches!(err, Md2PdfError::EngineUnavailable { .. }));
    assert!(err.to_string().contains("wkhtmltopdf"));
    let events = observer.events();
    assert_eq!(events.len(), 1, "got {events:?}");
    assert!(matches!(events[0], BatchEvent::FatalError { .. }));
    assert!(pdfs_in(&out).is_empty());
}

#[tokio::test]
async fn uncreatable_output_dir_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = write(dir.path(), "blocker", b"not a directory");
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .output_dir(blocker.join("out"))
        .build()
        .unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let observer = Collect::default();
    let err = assert_err!(
        BatchConversionController::new(engine.clone())
            .run(&request, &observer)
            .await
    );

    assert!(matches!(err, Md2PdfError::OutputDirUnavailable { .. }));
    assert!(engine.calls().is_empty());
    assert!(matches!(
        observer.events().as_slice(),
        [BatchEvent::FatalError { .. }]
    ));
}

#[tokio::test]
async fn header_fragment_is_removed_after_engine_failure() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .output_dir(dir.path().join("out"))
        .header("Quarterly report")
        .footer("Confidential")
        .build()
        .unwrap();

    let engine = Arc::new(FailingEngine::default());
    let summary = assert_ok!(
        BatchConversionController::new(engine.clone())
            .run(&request, &NoopObserver)
            .await
    );

    assert_eq!(summary.failed(), 1);
    match &summary.outcomes[0].error {
        Some(FileError::Render { detail, .. }) => assert!(detail.contains("ContentNotFound")),
        other => panic!("expected Render error, got {other:?}"),
    }

    let seen = engine.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    for (path, existed) in seen {
        assert!(existed, "{} missing during the engine call", path.display());
        assert!(!path.exists(), "{} left behind", path.display());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(
            name.starts_with("header_temp_1_") || name.starts_with("footer_temp_1_"),
            "unexpected fragment name {name}"
        );
    }
}

#[tokio::test]
async fn fragments_carry_escaped_text_and_are_cleaned_on_success() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"Euler: $e^{i\\pi} + 1 = 0$"))
        .output_dir(dir.path().join("out"))
        .header("R&D <draft>")
        .build()
        .unwrap();

    let engine = Arc::new(RecordingEngine::default());
    assert_ok!(
        BatchConversionController::new(engine.clone())
            .run(&request, &NoopObserver)
            .await
    );

    let calls = engine.calls();
    let call = &calls[0];
    assert!(call.header_existed);
    let header = call.header.as_ref().unwrap();
    assert!(!header.exists());
    let header_html = call.header_html.as_deref().unwrap();
    assert!(header_html.contains("R&amp;D &lt;draft&gt;"));
    assert!(call.html.contains("math-inline"));
    assert!(call.html.contains('π'));
    assert!(!call.html.contains("\\pi"));
}

#[tokio::test]
async fn slow_engine_times_out_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "slow.md", b"# Slow"))
        .output_dir(dir.path().join("out"))
        .engine_timeout_secs(1)
        .build()
        .unwrap();

    let observer = Collect::default();
    let summary = assert_ok!(
        BatchConversionController::new(Arc::new(SlowEngine))
            .run(&request, &observer)
            .await
    );

    assert_eq!(
        summary.outcomes[0].error,
        Some(FileError::Timeout {
            file: "slow.md".into(),
            secs: 1
        })
    );
    assert!(matches!(
        observer.events().last(),
        Some(BatchEvent::Completed { .. })
    ));
}

#[tokio::test]
async fn cancellation_leaves_remaining_files_pending() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .input(write(dir.path(), "b.md", b"# B"))
        .input(write(dir.path(), "c.md", b"# C"))
        .output_dir(&out)
        .build()
        .unwrap();

    let cancel = CancelFlag::new();
    let engine = Arc::new(CancellingEngine {
        cancel: cancel.clone(),
    });
    let observer = Collect::default();
    let summary = assert_ok!(
        BatchConversionController::new(engine)
            .run_until_cancelled(&request, &observer, &cancel)
            .await
    );

    assert!(summary.cancelled);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.pending(), 2);
    assert_eq!(summary.outcomes[2].status, FileStatus::Pending);
    assert_eq!(pdfs_in(&out), vec!["a.pdf"]);

    let events = observer.events();
    assert!(logs(&events).iter().any(|l| l.starts_with("Cancelled after 1 of 3")));
    assert!(matches!(events.last(), Some(BatchEvent::Completed { .. })));
}

#[tokio::test]
async fn cancelled_run_does_not_affect_the_next_one() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .input(write(dir.path(), "b.md", b"# B"))
        .output_dir(&out)
        .build()
        .unwrap();

    let cancel = CancelFlag::new();
    let controller = BatchConversionController::new(Arc::new(CancellingEngine {
        cancel: cancel.clone(),
    }));

    let first = assert_ok!(
        controller
            .run_until_cancelled(&request, &NoopObserver, &cancel)
            .await
    );
    assert!(first.cancelled);
    assert_eq!(first.pending(), 1);

    let second = assert_ok!(controller.run(&request, &NoopObserver).await);
    assert!(!second.cancelled);
    assert_eq!(second.succeeded(), 2);
    assert_eq!(second.pending(), 0);
}

#[tokio::test]
async fn each_spawned_batch_gets_its_own_cancel_flag() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .input(write(dir.path(), "b.md", b"# B"))
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();
    let controller = Arc::new(BatchConversionController::new(Arc::new(
        RecordingEngine::default(),
    )));

    let mut first = spawn_batch(controller.clone(), request.clone());
    first.cancel.cancel();
    while first.events.next().await.is_some() {}
    let stopped = assert_ok!(first.join().await);
    assert!(stopped.cancelled);
    assert_eq!(stopped.pending(), 2);

    let mut second = spawn_batch(controller, request);
    while second.events.next().await.is_some() {}
    let finished = assert_ok!(second.join().await);
    assert!(!finished.cancelled);
    assert_eq!(finished.succeeded(), 2);
}

#[tokio::test]
async fn same_named_inputs_get_distinct_outputs() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "guide/README.md", b"# Guide"))
        .input(write(dir.path(), "api/readme.md", b"# API"))
        .input(write(dir.path(), "faq/README.md", b"# FAQ"))
        .output_dir(&out)
        .build()
        .unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let summary = assert_ok!(
        BatchConversionController::new(engine.clone())
            .run(&request, &NoopObserver)
            .await
    );

    assert_eq!(summary.succeeded(), 3);
    let outputs: Vec<PathBuf> = engine.calls().into_iter().map(|c| c.output).collect();
    assert_eq!(
        outputs,
        vec![
            out.join("README.pdf"),
            out.join("readme-2.pdf"),
            out.join("README-3.pdf"),
        ]
    );
}

#[tokio::test]
async fn progress_is_monotone_and_ends_at_100() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (1..=7)
        .map(|i| write(dir.path(), &format!("f{i}.md"), b"text"))
        .collect();
    let request = ConversionRequest::builder()
        .inputs(inputs)
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();

    let observer = Collect::default();
    assert_ok!(
        BatchConversionController::new(Arc::new(RecordingEngine::default()))
            .run(&request, &observer)
            .await
    );

    let p = percents(&observer.events());
    assert_eq!(p.first(), Some(&0));
    assert_eq!(p.last(), Some(&100));
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "not monotone: {p:?}");
    assert_eq!(p.iter().filter(|&&v| v == 100).count(), 1);
}

#[tokio::test]
async fn spawned_batch_streams_events_in_order() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .input(write(dir.path(), "b.md", b"# B"))
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();

    let controller = Arc::new(BatchConversionController::new(Arc::new(
        RecordingEngine::default(),
    )));
    let mut handle = spawn_batch(controller, request);

    let mut events = Vec::new();
    while let Some(event) = handle.events.next().await {
        events.push(event);
    }
    let summary = assert_ok!(handle.join().await);
    assert_eq!(summary.succeeded(), 2);

    assert_eq!(events.first(), Some(&BatchEvent::BatchStarted { total: 2 }));
    assert!(events.last().unwrap().is_terminal());
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::FileStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![1, 2]);

    // Each file's start precedes its result line.
    let pos = |pred: &dyn Fn(&BatchEvent) -> bool| events.iter().position(pred).unwrap();
    let b_start = pos(&|e| matches!(e, BatchEvent::FileStarted { index: 2, .. }));
    let a_line = pos(&|e| matches!(e, BatchEvent::Log { line } if line.starts_with("✓ a.md")));
    let b_line = pos(&|e| matches!(e, BatchEvent::Log { line } if line.starts_with("✓ b.md")));
    assert!(a_line < b_start && b_start < b_line);
}

#[tokio::test]
async fn spawned_batch_ends_with_fatal_error() {
    let dir = TempDir::new().unwrap();
    let request = ConversionRequest::builder()
        .input(write(dir.path(), "a.md", b"# A"))
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();

    let mut handle = spawn_batch(
        Arc::new(BatchConversionController::new(Arc::new(MissingEngine))),
        request,
    );
    let events: Vec<BatchEvent> = (&mut handle.events).collect().await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        BatchEvent::FatalError { message } => assert!(message.contains("wkhtmltopdf")),
        other => panic!("expected fatal error, got {other:?}"),
    }
    assert_err!(handle.join().await);
}
