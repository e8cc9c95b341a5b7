//! Input collection and output-path planning.
//!
//! Callers may mix files and directories. Directories are walked recursively
//! for Markdown files, sorted so runs are reproducible, and the combined list
//! is de-duplicated while keeping first-seen order.

use crate::error::{FileError, Md2PdfError};
use crate::output::display_name;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions accepted as Markdown, compared case-insensitively.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Whether `path` has a Markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|m| e.eq_ignore_ascii_case(m))
        })
        .unwrap_or(false)
}

/// Expand `paths` into an ordered list of Markdown files.
///
/// Files are taken as given (whatever their extension). Directories
/// contribute every Markdown file beneath them, sorted by path.
pub fn collect_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, Md2PdfError> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for p in paths {
        let p = p.as_ref();
        if p.is_dir() {
            let found = markdown_files_under(p);
            if found.is_empty() {
                return Err(Md2PdfError::NoMarkdownFiles {
                    dir: p.to_path_buf(),
                });
            }
            debug!("{} Markdown files under {}", found.len(), p.display());
            for f in found {
                if seen.insert(f.clone()) {
                    out.push(f);
                }
            }
        } else if p.exists() {
            if seen.insert(p.to_path_buf()) {
                out.push(p.to_path_buf());
            }
        } else {
            return Err(Md2PdfError::InputNotFound {
                path: p.to_path_buf(),
            });
        }
    }
    Ok(out)
}

fn markdown_files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_markdown(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

// ── Output paths ─────────────────────────────────────────────────────────────

/// `<out_dir>/<input stem>.pdf`.
pub fn derive_output_path(input: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.pdf", stem(input)))
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Output path for every input, unique within the batch.
///
/// The first input with a given stem gets `<stem>.pdf`; later ones get
/// `<stem>-2.pdf`, `<stem>-3.pdf`, … in input order.
pub fn plan_output_paths(inputs: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(inputs.len());

    for input in inputs {
        let base = stem(input);
        // Case-insensitive: two names differing only in case collide on
        // Windows and macOS file systems.
        if taken.insert(base.to_lowercase()) {
            out.push(derive_output_path(input, out_dir));
            continue;
        }

        let n = next_suffix.entry(base.to_lowercase()).or_insert(2);
        let name = loop {
            let candidate = format!("{base}-{n}");
            *n += 1;
            if taken.insert(candidate.to_lowercase()) {
                break candidate;
            }
        };
        warn!(
            "Output name collision for {}; writing {}.pdf",
            input.display(),
            name
        );
        out.push(out_dir.join(format!("{name}.pdf")));
    }
    out
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Read a Markdown file as UTF-8, dropping a leading byte-order mark.
pub async fn read_markdown(path: &Path) -> Result<String, FileError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| FileError::Read {
        file: display_name(path),
        detail: e.to_string(),
    })?;
    let text = String::from_utf8(bytes).map_err(|e| FileError::Read {
        file: display_name(path),
        detail: format!("not valid UTF-8 ({})", e.utf8_error()),
    })?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}
