//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements one step, so each can be tested alone and the
//! engine can be swapped for a fake without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ math ──▶ markdown ──▶ document ──▶ options ──▶ engine
//! (files)  (rewrite)  (HTML)      (print CSS)  (flags)    (wkhtmltopdf)
//! ```
//!
//! 1. [`input`]    — expand directories, plan unique output paths, read UTF-8
//! 2. [`math`]     — ordered regex stages turning `$…$` / `$$…$$` into HTML
//! 3. [`markdown`] — Markdown → HTML behind a fallible converter trait
//! 4. [`document`] — standalone body document and header/footer strips
//! 5. [`options`]  — layout → engine options, safety flags always on
//! 6. [`engine`]   — the child-process boundary; the only stage with external I/O

pub mod document;
pub mod engine;
pub mod input;
pub mod markdown;
pub mod math;
pub mod options;
