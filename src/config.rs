//! Configuration types for Markdown-to-PDF conversion.
//!
//! A run is described by one immutable [`ConversionRequest`], built via its
//! [`ConversionRequestBuilder`] before any work starts. The worker only ever
//! sees this snapshot, so nothing the caller does after `build()` can change
//! a conversion in flight.

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default per-file engine timeout, in seconds.
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 60;

/// Everything needed to run one conversion.
///
/// # Example
/// ```rust
/// use md2pdf::{ConversionRequest, PageSize};
///
/// let request = ConversionRequest::builder()
///     .input("notes/intro.md")
///     .input("notes/setup.md")
///     .output_dir("out")
///     .page_size(PageSize::Letter)
///     .footer("Internal draft")
///     .build()
///     .unwrap();
/// assert_eq!(request.inputs.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Input Markdown files, in processing order. Never empty.
    pub inputs: Vec<PathBuf>,

    /// Where the PDFs go.
    pub output: OutputTarget,

    /// Page geometry, encoding, and header/footer text.
    pub layout: PageLayout,

    /// Upper bound on a single engine invocation, in seconds. Default: 60.
    ///
    /// wkhtmltopdf occasionally hangs on pathological input (huge tables,
    /// broken fonts). The bound keeps one file from stalling the batch; the
    /// file is marked failed with a timeout and the next one starts.
    pub engine_timeout_secs: u64,
}

impl ConversionRequest {
    /// Create a new builder for `ConversionRequest`.
    pub fn builder() -> ConversionRequestBuilder {
        ConversionRequestBuilder {
            inputs: Vec::new(),
            output: None,
            layout: PageLayout::default(),
            engine_timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
        }
    }

    /// Directory that must exist before the first PDF is written.
    pub fn output_dir(&self) -> &Path {
        match &self.output {
            OutputTarget::Directory(dir) => dir,
            OutputTarget::File(file) => file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new(".")),
        }
    }

    /// Check the constraints `build()` enforces. Fields are public, so the
    /// controller re-checks requests assembled by hand.
    pub fn validate(&self) -> Result<(), Md2PdfError> {
        if self.inputs.is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "at least one input file is required".into(),
            ));
        }
        if let OutputTarget::File(ref file) = self.output {
            if self.inputs.len() != 1 {
                return Err(Md2PdfError::InvalidConfig(format!(
                    "an output file can only be used with a single input, got {} inputs",
                    self.inputs.len()
                )));
            }
            if file.file_name().is_none() {
                return Err(Md2PdfError::InvalidConfig(format!(
                    "output file '{}' has no file name",
                    file.display()
                )));
            }
        }
        if self.engine_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "engine timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

/// Destination of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Batch mode: one `<stem>.pdf` per input inside this directory.
    Directory(PathBuf),
    /// Single-file mode: exactly this PDF path. Only valid with one input.
    File(PathBuf),
}

/// Builder for [`ConversionRequest`].
#[derive(Debug)]
pub struct ConversionRequestBuilder {
    inputs: Vec<PathBuf>,
    output: Option<OutputTarget>,
    layout: PageLayout,
    engine_timeout_secs: u64,
}

impl ConversionRequestBuilder {
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(OutputTarget::Directory(dir.into()));
        self
    }

    pub fn output_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.output = Some(OutputTarget::File(file.into()));
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.layout.header = Some(text.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.layout.footer = Some(text.into());
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.layout.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.layout.margins = margins;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.layout.encoding = encoding;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.engine_timeout_secs = secs.max(1);
        self
    }

    /// Build the request, validating constraints.
    pub fn build(self) -> Result<ConversionRequest, Md2PdfError> {
        let output = self.output.ok_or_else(|| {
            Md2PdfError::InvalidConfig("an output directory or file is required".into())
        })?;
        let request = ConversionRequest {
            inputs: self.inputs,
            output,
            layout: self.layout,
            engine_timeout_secs: self.engine_timeout_secs,
        };
        request.validate()?;
        Ok(request)
    }
}

// ── Page layout ──────────────────────────────────────────────────────────

/// Page geometry and decoration shared by every file in a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageLayout {
    /// Text repeated at the top of every page. Blank means no header.
    pub header: Option<String>,
    /// Text repeated at the bottom of every page. Blank means no footer.
    pub footer: Option<String>,
    pub page_size: PageSize,
    pub margins: Margins,
    pub encoding: TextEncoding,
}

impl PageLayout {
    /// Header text, trimmed, or `None` when absent or blank.
    pub fn header_text(&self) -> Option<&str> {
        non_blank(self.header.as_deref())
    }

    /// Footer text, trimmed, or `None` when absent or blank.
    pub fn footer_text(&self) -> Option<&str> {
        non_blank(self.footer.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 20,
            right: 15,
            bottom: 20,
            left: 15,
        }
    }
}

/// Paper size passed through to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
}

impl PageSize {
    /// Name as the engine expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::A3 => "A3",
            PageSize::Letter => "Letter",
            PageSize::Legal => "Legal",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageSize {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "a3" => Ok(PageSize::A3),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(Md2PdfError::InvalidConfig(format!(
                "unknown page size '{other}' (expected A4, A3, Letter or Legal)"
            ))),
        }
    }
}

/// Default text encoding declared to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Gbk,
    Gb2312,
}

impl TextEncoding {
    /// Name as the engine expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Gbk => "GBK",
            TextEncoding::Gb2312 => "GB2312",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEncoding {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Ok(TextEncoding::Utf8),
            "GBK" => Ok(TextEncoding::Gbk),
            "GB2312" => Ok(TextEncoding::Gb2312),
            other => Err(Md2PdfError::InvalidConfig(format!(
                "unknown encoding '{other}' (expected UTF-8, GBK or GB2312)"
            ))),
        }
    }
}
