//! The HTML → PDF engine boundary.
//!
//! [`PdfEngine`] is the seam the controller talks to; [`WkhtmltopdfEngine`]
//! drives the real `wkhtmltopdf` binary as a child process. Tests swap in
//! in-process fakes.
//!
//! ## Why stdin instead of a temp HTML file?
//!
//! The body document can be large and is only needed for the duration of one
//! process. Piping it avoids a second temp file per input (header and footer
//! fragments still go through files because wkhtmltopdf only accepts paths
//! for those). The write runs concurrently with reading the child's output,
//! so a chatty engine cannot deadlock on a full stderr pipe.

use crate::error::{EngineError, Md2PdfError};
use crate::pipeline::options::RenderOptions;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use wkhtmltopdf_locate::{EngineLocation, INSTALL_GUIDANCE};

/// Upper bound for `wkhtmltopdf --version`.
pub const SELF_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// An out-of-process HTML → PDF converter.
pub trait PdfEngine: Send + Sync {
    /// Verify the engine is present and runs. Returns its version string.
    ///
    /// Failure is fatal for a batch and must carry installation guidance.
    fn self_check(&self) -> impl Future<Output = Result<String, Md2PdfError>> + Send;

    /// Render `html` to a PDF at `output`.
    fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        output: &Path,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// `wkhtmltopdf` child-process engine.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfEngine {
    binary: PathBuf,
}

impl WkhtmltopdfEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_location(location: EngineLocation) -> Self {
        Self::new(location.path)
    }

    /// Engine using the bare binary name, resolved through `PATH` at spawn
    /// time.
    pub fn from_path_lookup() -> Self {
        Self::new(wkhtmltopdf_locate::binary_name())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn unavailable(&self, reason: String) -> Md2PdfError {
        Md2PdfError::EngineUnavailable {
            path: self.binary.clone(),
            reason,
            guidance: INSTALL_GUIDANCE,
        }
    }
}

impl PdfEngine for WkhtmltopdfEngine {
    async fn self_check(&self) -> Result<String, Md2PdfError> {
        let run = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let out = match tokio::time::timeout(SELF_CHECK_TIMEOUT, run).await {
            Err(_) => {
                return Err(self.unavailable(format!(
                    "--version did not finish within {}s",
                    SELF_CHECK_TIMEOUT.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(self.unavailable(e.to_string())),
            Ok(Ok(out)) => out,
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(self.unavailable(format!(
                "--version exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }

        let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
        info!("Engine OK: {} ({})", self.binary.display(), version);
        Ok(version)
    }

    async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(options.to_args())
            .arg("-")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Spawning {:?}", cmd.as_std());

        let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: self.binary.clone(),
            source,
        })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("engine stdin not captured")))?;

        let feed = async move {
            stdin.write_all(html.as_bytes()).await?;
            stdin.shutdown().await
            // stdin dropped here: EOF for the engine
        };
        let (fed, waited) = tokio::join!(feed, child.wait_with_output());
        let out = waited?;

        if !out.status.success() {
            return Err(EngineError::Failed {
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        // A successful exit after a failed write means truncated input.
        fed?;
        Ok(())
    }
}
