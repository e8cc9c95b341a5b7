//! # wkhtmltopdf-locate
//!
//! Find an installed [wkhtmltopdf](https://wkhtmltopdf.org/) binary without
//! asking the user to configure anything in the common case.
//!
//! ## How it works
//!
//! [`locate`] walks a fixed search order and returns the first candidate that
//! is an existing file (and, on Unix, executable):
//!
//! 1. The explicit path passed by the caller (e.g. a `--wkhtmltopdf` flag).
//! 2. The `WKHTMLTOPDF_PATH` environment variable.
//! 3. Every directory listed in `PATH`.
//! 4. Platform install locations (see [`common_locations`]).
//! 5. `~/wkhtmltopdf/bin/` in the user's home directory.
//!
//! The result is a plain [`EngineLocation`] value. Nothing is cached in
//! process-global state and nothing is written to disk: callers resolve once
//! at startup and pass the value to whoever needs it.
//!
//! ```rust,no_run
//! use wkhtmltopdf_locate::locate;
//!
//! match locate(None) {
//!     Ok(found) => println!("using {} ({})", found.path.display(), found.origin),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `WKHTMLTOPDF_PATH` — path to the binary; checked before `PATH`.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit binary location.
pub const ENV_VAR: &str = "WKHTMLTOPDF_PATH";

/// Official download page, quoted in [`INSTALL_GUIDANCE`].
pub const DOWNLOAD_URL: &str = "https://wkhtmltopdf.org/downloads.html";

/// Human-readable installation instructions shown when no usable binary exists.
pub const INSTALL_GUIDANCE: &str = "\
wkhtmltopdf could not be found or did not run.

To fix this:
  • Download the build for your platform from https://wkhtmltopdf.org/downloads.html
    (on Windows pick the full installer, which includes the patched Qt).
  • Install it, or unpack it anywhere and point WKHTMLTOPDF_PATH at the binary.
  • Or pass the binary location explicitly with --wkhtmltopdf <PATH>.

Common install locations:
  C:\\Program Files\\wkhtmltopdf\\bin\\wkhtmltopdf.exe
  /usr/local/bin/wkhtmltopdf
  /usr/bin/wkhtmltopdf";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by [`locate`].
#[derive(Error, Debug)]
pub enum LocateError {
    /// The caller named a path explicitly and it is not a usable binary.
    #[error("wkhtmltopdf not found at '{path}' (given explicitly)")]
    ExplicitPathMissing { path: PathBuf },

    /// No candidate in the search order exists.
    #[error("wkhtmltopdf not found in {searched} candidate locations\n\n{INSTALL_GUIDANCE}")]
    NotFound { searched: usize },
}

// ── Result type ──────────────────────────────────────────────────────────────

/// Where a located binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOrigin {
    /// Passed in by the caller.
    Explicit,
    /// Read from `WKHTMLTOPDF_PATH`.
    EnvVar,
    /// Found in a `PATH` directory.
    SearchPath,
    /// Found at a platform install location.
    InstallDir,
}

impl fmt::Display for LocationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationOrigin::Explicit => "explicit path",
            LocationOrigin::EnvVar => ENV_VAR,
            LocationOrigin::SearchPath => "PATH",
            LocationOrigin::InstallDir => "install location",
        };
        f.write_str(s)
    }
}

/// A resolved wkhtmltopdf binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLocation {
    pub path: PathBuf,
    pub origin: LocationOrigin,
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// File name of the binary on this platform.
pub fn binary_name() -> &'static str {
    if cfg!(windows) {
        "wkhtmltopdf.exe"
    } else {
        "wkhtmltopdf"
    }
}

/// Well-known install locations for the current platform, most likely first.
pub fn common_locations() -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = match std::env::consts::OS {
        "windows" => vec![
            PathBuf::from(r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe"),
            PathBuf::from(r"C:\Program Files (x86)\wkhtmltopdf\bin\wkhtmltopdf.exe"),
            PathBuf::from(r"D:\wkhtmltopdf\bin\wkhtmltopdf.exe"),
            PathBuf::from(r"E:\wkhtmltopdf\bin\wkhtmltopdf.exe"),
        ],
        "macos" => vec![
            PathBuf::from("/usr/local/bin/wkhtmltopdf"),
            PathBuf::from("/opt/homebrew/bin/wkhtmltopdf"),
        ],
        _ => vec![
            PathBuf::from("/usr/local/bin/wkhtmltopdf"),
            PathBuf::from("/usr/bin/wkhtmltopdf"),
        ],
    };

    // Next to the running executable, then in its bin/ subfolder.
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        out.push(dir.join(binary_name()));
        out.push(dir.join("bin").join(binary_name()));
    }

    if let Some(home) = dirs::home_dir() {
        out.push(home.join("wkhtmltopdf").join("bin").join(binary_name()));
    }

    out
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate wkhtmltopdf using the real process environment.
///
/// An explicit path that does not exist is an error rather than a reason to
/// keep searching: the caller asked for that binary specifically.
pub fn locate(explicit: Option<&Path>) -> Result<EngineLocation, LocateError> {
    locate_with(
        explicit,
        std::env::var_os(ENV_VAR),
        std::env::var_os("PATH"),
        &common_locations(),
    )
}

/// Locate wkhtmltopdf from explicitly supplied inputs.
///
/// [`locate`] is a thin wrapper that reads the environment; this form exists
/// so the search order can be exercised without touching process state.
pub fn locate_with(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    path_var: Option<OsString>,
    install_dirs: &[PathBuf],
) -> Result<EngineLocation, LocateError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if let Some(p) = explicit {
        return if is_executable(p, &cwd) {
            Ok(EngineLocation {
                path: p.to_path_buf(),
                origin: LocationOrigin::Explicit,
            })
        } else {
            Err(LocateError::ExplicitPathMissing {
                path: p.to_path_buf(),
            })
        };
    }

    let is_usable = |p: &Path| is_executable(p, &cwd);
    let mut searched = 0usize;

    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        searched += 1;
        let p = PathBuf::from(value);
        if is_usable(&p) {
            return Ok(EngineLocation {
                path: p,
                origin: LocationOrigin::EnvVar,
            });
        }
    }

    if let Some(var) = path_var.filter(|v| !v.is_empty()) {
        searched += std::env::split_paths(&var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .count();
        if let Ok(p) = which::which_in(binary_name(), Some(&var), &cwd) {
            return Ok(EngineLocation {
                path: p,
                origin: LocationOrigin::SearchPath,
            });
        }
    }

    searched += install_dirs.len();
    if let Some(p) = install_dirs.iter().find(|p| is_usable(p)) {
        return Ok(EngineLocation {
            path: p.clone(),
            origin: LocationOrigin::InstallDir,
        });
    }

    Err(LocateError::NotFound { searched })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// An existing file the current user may execute.
fn is_executable(path: &Path, cwd: &Path) -> bool {
    // Joined onto cwd so a bare name is checked in place, not looked up.
    which::which_in(cwd.join(path), None::<&OsStr>, cwd).is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
