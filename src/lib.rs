//! # md2pdf
//!
//! Convert Markdown documents to paginated PDF through
//! [wkhtmltopdf](https://wkhtmltopdf.org/), with offline rendering of light
//! math.
//!
//! ## Why this crate?
//!
//! Markdown is where notes, reports and course material get written; PDF is
//! what gets handed around. Browser-based pipelines need a JavaScript math
//! typesetter and often a network connection. This crate keeps the whole
//! path local: math is approximated with Unicode and a few CSS classes, the
//! document gets a fixed print stylesheet, and wkhtmltopdf runs with scripts
//! and link navigation switched off.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown file
//!  │
//!  ├─ 1. Read      UTF-8, BOM stripped
//!  ├─ 2. Math      $…$ / $$…$$ → Unicode + styled spans (ordered rewrite stages)
//!  ├─ 3. Markdown  pulldown-cmark → HTML fragment
//!  ├─ 4. Document  print stylesheet, glyph preload, header/footer strips
//!  ├─ 5. Options   page size, margins, encoding, locked-down engine flags
//!  ├─ 6. Engine    wkhtmltopdf child process, bounded by a timeout
//!  └─ 7. Cleanup   header/footer temp files removed on every path
//! ```
//!
//! Batches run those steps file by file; a failing file is recorded and the
//! batch moves on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{BatchConversionController, ConversionRequest, NoopObserver, WkhtmltopdfEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let location = wkhtmltopdf_locate::locate(None)?;
//!     let engine = Arc::new(WkhtmltopdfEngine::from_location(location));
//!
//!     let request = ConversionRequest::builder()
//!         .inputs(md2pdf::collect_inputs(&["docs/"])?)
//!         .output_dir("pdf")
//!         .header("Project handbook")
//!         .build()?;
//!
//!     let summary = BatchConversionController::new(engine)
//!         .run(&request, &NoopObserver)
//!         .await?;
//!     eprintln!("{} converted, {} failed", summary.succeeded(), summary.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionRequest, ConversionRequestBuilder, Margins, OutputTarget, PageLayout, PageSize,
    TextEncoding,
};
pub use convert::{convert_file, BatchConversionController, ConversionJob, JobState};
pub use error::{CleanupWarning, EngineError, FileError, Md2PdfError};
pub use output::{BatchSummary, FileConversionOutcome, FileStatus};
pub use pipeline::document::{DocumentRenderer, RenderedDocument};
pub use pipeline::engine::{PdfEngine, WkhtmltopdfEngine};
pub use pipeline::input::{collect_inputs, derive_output_path};
pub use pipeline::math::MathNormalizer;
pub use pipeline::options::{build_render_options, RenderOptions};
pub use progress::{BatchObserver, CancelFlag, NoopObserver};
pub use stream::{spawn_batch, BatchEvent, BatchEventStream, BatchHandle};
