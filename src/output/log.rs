//! Diagnostic log shared by all probe workers.
//!
//! Every probe appends one block. Blocks are written whole while holding
//! the lock, so concurrent workers never interleave partial lines. Append
//! order follows completion order.

use crate::error::Result;
use crate::probe::ProbeOutcome;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct LogFile {
    file: File,
    /// First write failure; reported by [`DiagnosticLog::finish`].
    error: Option<io::Error>,
}

/// Append-only per-run trace of every probe.
pub struct DiagnosticLog {
    path: PathBuf,
    inner: Mutex<LogFile>,
}

impl DiagnosticLog {
    /// Create (or truncate) the log file and write the run header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).await?;
        let header = format!(
            "# proxyprobe run started {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        file.write_all(header.as_bytes()).await?;

        Ok(Self {
            path,
            inner: Mutex::new(LogFile { file, error: None }),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the block for one outcome.
    ///
    /// Write failures do not propagate to the probe; the first one is kept
    /// and returned from [`finish`](Self::finish).
    pub async fn append(&self, outcome: &ProbeOutcome) {
        let block = format_block(outcome);
        let mut inner = self.inner.lock().await;
        if inner.error.is_some() {
            return;
        }
        if let Err(e) = inner.file.write_all(block.as_bytes()).await {
            tracing::error!("failed to write {}: {e}", self.path.display());
            inner.error = Some(e);
        }
    }

    /// Flush the log and report any write failure seen during the run.
    ///
    /// # Errors
    ///
    /// Returns the first append failure, or the flush failure.
    pub async fn finish(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(e) = inner.error.take() {
            return Err(e.into());
        }
        inner.file.flush().await?;
        Ok(())
    }
}

/// Render the log block for one outcome.
#[must_use]
pub fn format_block(outcome: &ProbeOutcome) -> String {
    let label = outcome.label();
    let header = if label == outcome.candidate {
        format!("--- proxy: {label} ---")
    } else {
        format!("--- proxy: {label} (requested {}) ---", outcome.candidate)
    };

    format!(
        "\n{header}\nSTDOUT: {}\nSTDERR: {}\nStatus: {}\n\n",
        outcome.stdout.trim(),
        outcome.stderr.trim(),
        outcome.exit_code
    )
}
