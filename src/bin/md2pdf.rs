//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate: maps flags to a `ConversionRequest`,
//! runs it on a background task, and renders the event stream.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    collect_inputs, spawn_batch, BatchConversionController, BatchEvent, ConversionRequest,
    Margins, PageLayout, PageSize, TextEncoding, WkhtmltopdfEngine,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal reporter ────────────────────────────────────────────────────────

/// Renders batch events: a percentage bar when attached to a terminal, plain
/// log lines otherwise.
struct Reporter {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl Reporter {
    fn new(show_progress: bool, quiet: bool) -> Self {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(TICKS),
            );
            bar.set_prefix("Preparing");
            bar.set_message("Checking wkhtmltopdf…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Self { bar, quiet }
    }

    fn activate_bar(&self, total: usize) {
        let Some(bar) = &self.bar else { return };
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix(format!("Converting {total}"));
    }

    fn line(&self, line: &str) {
        if self.quiet {
            return;
        }
        let line = if line.starts_with('✓') {
            format!("  {}", green(line))
        } else if line.starts_with('✗') {
            format!("  {}", red(line))
        } else if line.starts_with('-') {
            format!("  {}", dim(line))
        } else {
            format!("{} {}", cyan("◆"), bold(line))
        };
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    /// Status message outside the per-file log, shown unless quiet.
    fn notice(&self, msg: &str) {
        if self.quiet {
            return;
        }
        let line = format!("{} {}", cyan("◆"), msg);
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }

    fn handle(&self, event: BatchEvent) {
        match event {
            BatchEvent::BatchStarted { total } => self.activate_bar(total),
            BatchEvent::FileStarted { index, total, source } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!("{index}/{total} {}", file_name(&source)));
                }
            }
            BatchEvent::Progress { percent } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(u64::from(percent));
                }
            }
            BatchEvent::Log { line } => self.line(&line),
            BatchEvent::Completed { .. } | BatchEvent::FatalError { .. } => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

/// What the n-th Ctrl-C press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Let the running file finish, then stop the batch.
    FinishCurrent,
    /// Stop immediately, killing the engine.
    Abort,
}

impl Interrupt {
    fn for_press(presses: u8) -> Self {
        if presses <= 1 {
            Interrupt::FinishCurrent
        } else {
            Interrupt::Abort
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single file, PDF written next to it (notes.pdf)
  md2pdf notes.md

  # Single file to an explicit path
  md2pdf notes.md -o ~/Desktop/handbook.pdf

  # Whole folder (recursive) into one output directory
  md2pdf docs/ -o pdf/

  # Several files with a header, a footer and Letter paper
  md2pdf intro.md setup.md faq.md -o out/ \
      --header "Project handbook" --footer "Internal" --page-size letter

  # Tighter margins, GBK-encoded output
  md2pdf report.md --margin-top 10 --margin-bottom 10 --encoding gbk

  # Machine-readable summary
  md2pdf docs/ -o pdf/ --json > summary.json

MATH:
  Inline $...$ and display $$...$$ formulas are rendered offline with Unicode
  and CSS: Greek letters, \frac, \sqrt, \sum/\int limits, sub/superscripts,
  common operators. Unsupported commands are printed as written.

ENVIRONMENT VARIABLES:
  WKHTMLTOPDF_PATH     Path to the wkhtmltopdf binary (checked before PATH)
  MD2PDF_OUTPUT        Default for -o/--output
  MD2PDF_TIMEOUT       Per-file engine timeout in seconds
  RUST_LOG             Override log filtering (e.g. md2pdf=debug)

SETUP:
  md2pdf needs wkhtmltopdf 0.12.x: https://wkhtmltopdf.org/downloads.html
  It is searched for in WKHTMLTOPDF_PATH, PATH, and the usual install
  locations; pass --wkhtmltopdf <PATH> to use a specific binary.
"#;

/// Convert Markdown files to PDF through wkhtmltopdf.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files to PDF through wkhtmltopdf",
    long_about = "Convert Markdown files or whole folders to paginated PDF. Math in $...$ and \
$$...$$ is rendered offline with Unicode; headers, footers, page size, margins and encoding \
are configurable. Each file is converted independently: one broken file does not stop the batch.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown files and/or directories (searched recursively for *.md).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF (single input) or output directory.
    #[arg(
        short,
        long,
        env = "MD2PDF_OUTPUT",
        long_help = "Where to write PDFs. With a single input file, a path ending in .pdf is used \
as the output file. Otherwise this is a directory (created if missing) receiving one \
<name>.pdf per input. Default: next to a single input, or the current directory."
    )]
    output: Option<PathBuf>,

    /// Text shown at the top of every page.
    #[arg(long, env = "MD2PDF_HEADER")]
    header: Option<String>,

    /// Text shown at the bottom of every page (page numbers are always shown).
    #[arg(long, env = "MD2PDF_FOOTER")]
    footer: Option<String>,

    /// Paper size.
    #[arg(long, env = "MD2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Top margin in millimetres (0–50).
    #[arg(long, env = "MD2PDF_MARGIN_TOP", default_value_t = 20,
          value_parser = clap::value_parser!(u32).range(0..=50))]
    margin_top: u32,

    /// Right margin in millimetres (0–50).
    #[arg(long, env = "MD2PDF_MARGIN_RIGHT", default_value_t = 15,
          value_parser = clap::value_parser!(u32).range(0..=50))]
    margin_right: u32,

    /// Bottom margin in millimetres (0–50).
    #[arg(long, env = "MD2PDF_MARGIN_BOTTOM", default_value_t = 20,
          value_parser = clap::value_parser!(u32).range(0..=50))]
    margin_bottom: u32,

    /// Left margin in millimetres (0–50).
    #[arg(long, env = "MD2PDF_MARGIN_LEFT", default_value_t = 15,
          value_parser = clap::value_parser!(u32).range(0..=50))]
    margin_left: u32,

    /// Text encoding declared to the engine.
    #[arg(long, env = "MD2PDF_ENCODING", value_enum, default_value = "utf-8")]
    encoding: EncodingArg,

    /// Path to the wkhtmltopdf binary (default: search WKHTMLTOPDF_PATH, PATH, install dirs).
    #[arg(long, value_name = "PATH")]
    wkhtmltopdf: Option<PathBuf>,

    /// Per-file engine timeout in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    A3,
    Letter,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::A3 => PageSize::A3,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    #[value(name = "utf-8", alias = "utf8")]
    Utf8,
    Gbk,
    Gb2312,
}

impl From<EncodingArg> for TextEncoding {
    fn from(v: EncodingArg) -> Self {
        match v {
            EncodingArg::Utf8 => TextEncoding::Utf8,
            EncodingArg::Gbk => TextEncoding::Gbk,
            EncodingArg::Gb2312 => TextEncoding::Gb2312,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs; verbose wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve the engine once ──────────────────────────────────────────
    let engine = resolve_engine(cli.wkhtmltopdf.as_deref());

    // ── Build request ────────────────────────────────────────────────────
    let request = build_request(&cli)?;
    let total = request.inputs.len();

    // ── Run ──────────────────────────────────────────────────────────────
    let controller = Arc::new(BatchConversionController::new(Arc::new(engine)));
    let mut handle = spawn_batch(controller, request);

    // First Ctrl-C: finish the current file, then stop. Second: abort now;
    // dropping the batch task kills the engine process.
    let reporter = Reporter::new(show_progress, cli.quiet || cli.json);
    let mut interrupts = 0u8;
    let mut watch_signals = true;
    loop {
        tokio::select! {
            event = handle.events.next() => match event {
                Some(event) => reporter.handle(event),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if watch_signals => {
                if let Err(e) = signal {
                    debug!("Cannot listen for Ctrl-C: {}", e);
                    watch_signals = false;
                    continue;
                }
                interrupts = interrupts.saturating_add(1);
                match Interrupt::for_press(interrupts) {
                    Interrupt::FinishCurrent => {
                        handle.cancel.cancel();
                        reporter.notice("Stopping after the current file… (Ctrl-C again to abort)");
                    }
                    Interrupt::Abort => {
                        handle.task.abort();
                        reporter.abandon();
                        anyhow::bail!("Interrupted");
                    }
                }
            }
        }
    }

    let summary = handle.join().await.context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        let failed = summary.failed();
        let mark = if summary.cancelled {
            cyan("⚠")
        } else if failed == 0 {
            green("✔")
        } else if failed == total {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{}  {}/{} files converted  {}ms",
            mark,
            bold(&summary.succeeded().to_string()),
            total,
            summary.duration_ms
        );
        if failed > 0 {
            eprintln!("   {} failed", red(&failed.to_string()));
        }
        if summary.cancelled {
            eprintln!("   {} not converted (cancelled)", summary.pending());
        }
    }

    summary.into_result().context("Some files could not be converted")?;
    Ok(())
}

/// Pick the engine binary. If nothing usable is found the bare name is used
/// and the batch's self-check reports the problem with install guidance.
fn resolve_engine(explicit: Option<&Path>) -> WkhtmltopdfEngine {
    match wkhtmltopdf_locate::locate(explicit) {
        Ok(found) => {
            info!("Using wkhtmltopdf at {} ({})", found.path.display(), found.origin);
            WkhtmltopdfEngine::from_location(found)
        }
        Err(e) => {
            debug!("{}", e);
            match explicit {
                Some(p) => WkhtmltopdfEngine::new(p),
                None => WkhtmltopdfEngine::from_path_lookup(),
            }
        }
    }
}

/// Map CLI args to a `ConversionRequest`.
fn build_request(cli: &Cli) -> Result<ConversionRequest> {
    let inputs = collect_inputs(&cli.inputs).context("Cannot collect input files")?;

    let layout = PageLayout {
        header: cli.header.clone(),
        footer: cli.footer.clone(),
        page_size: cli.page_size.into(),
        margins: Margins {
            top: cli.margin_top,
            right: cli.margin_right,
            bottom: cli.margin_bottom,
            left: cli.margin_left,
        },
        encoding: cli.encoding.into(),
    };

    let single_file = cli.inputs.len() == 1 && inputs.len() == 1 && !cli.inputs[0].is_dir();

    let builder = ConversionRequest::builder()
        .inputs(inputs.iter().cloned())
        .layout(layout)
        .engine_timeout_secs(cli.timeout);

    let builder = match (&cli.output, single_file) {
        (Some(out), _) if is_pdf_path(out) => builder.output_file(out),
        (Some(out), _) => builder.output_dir(out),
        (None, true) => builder.output_file(inputs[0].with_extension("pdf")),
        (None, false) => builder.output_dir("."),
    };

    builder.build().context("Invalid configuration")
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
