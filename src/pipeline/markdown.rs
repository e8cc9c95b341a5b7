//! Markdown → HTML conversion.
//!
//! Conversion sits behind [`MarkdownConverter`] so the math pass can fall
//! back cleanly when a converter rejects its input. The default,
//! [`CommonMarkConverter`], wraps `pulldown-cmark` with the GitHub-flavoured
//! extensions people expect from a Markdown document (tables, footnotes,
//! strikethrough, task lists) and keeps single newlines as line breaks.

use pulldown_cmark::{html, Event, Options, Parser};
use thiserror::Error;

/// Failure reported by a [`MarkdownConverter`].
#[derive(Debug, Error)]
#[error("markdown conversion failed: {0}")]
pub struct MarkdownError(pub String);

/// Turns Markdown source into an HTML fragment.
pub trait MarkdownConverter: Send + Sync {
    fn to_html(&self, markdown: &str) -> Result<String, MarkdownError>;
}

/// `pulldown-cmark` based converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkConverter;

impl CommonMarkConverter {
    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options
    }
}

impl MarkdownConverter for CommonMarkConverter {
    fn to_html(&self, markdown: &str) -> Result<String, MarkdownError> {
        // Authors of these documents expect a line break where they pressed
        // Enter, not CommonMark's paragraph reflow.
        let parser = Parser::new_ext(markdown, Self::options()).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        });
        let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Escape text for inclusion in HTML element content or double-quoted
/// attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String is infallible.
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}
