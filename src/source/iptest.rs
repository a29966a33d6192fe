//! External checker collaborator.
//!
//! The `iptest` binary pre-screens a candidate list and writes a CSV with
//! per-IP metadata. The pipeline only depends on the [`ExternalChecker`]
//! trait, so how the binary is spawned stays out of the probe core.

#![allow(clippy::missing_errors_doc)]

use crate::error::{Error, Result};
use crate::probe::Candidate;
use crate::source::candidates::CandidateSource;
use crate::source::ingest::csv_records;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Minimum number of columns in an iptest CSV.
const IPTEST_MIN_COLUMNS: usize = 9;

/// Column holding the country code.
const IPTEST_COUNTRY_COLUMN: usize = 8;

/// Pre-screens a candidate file and produces a result file.
pub trait ExternalChecker: Send + Sync {
    /// Check the candidates in `input`, writing results to `output`.
    ///
    /// Returns the path of the produced file.
    fn run(&self, input: &Path, output: &Path) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Runs the `iptest` binary as a child process.
#[derive(Debug, Clone)]
pub struct IptestRunner {
    binary: PathBuf,
    tls: bool,
}

impl IptestRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tls: true,
        }
    }

    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Command-line arguments for one invocation.
    #[must_use]
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-file".to_string(),
            input.display().to_string(),
            "-outfile".to_string(),
            output.display().to_string(),
            format!("-tls={}", self.tls),
        ]
    }
}

impl ExternalChecker for IptestRunner {
    fn run(&self, input: &Path, output: &Path) -> impl Future<Output = Result<PathBuf>> + Send {
        let mut command = Command::new(&self.binary);
        command
            .args(self.args(input, output))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let binary = self.binary.display().to_string();
        let output = output.to_path_buf();

        async move {
            tracing::info!("running {binary}");
            let mut child = command
                .spawn()
                .map_err(|e| Error::external(format!("cannot start {binary}: {e}")))?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            tokio::join!(relay(stdout), relay(stderr));

            let status = child.wait().await?;
            if !status.success() {
                return Err(Error::external(format!("{binary} exited with {status}")));
            }
            if !output.exists() {
                return Err(Error::external(format!(
                    "{binary} produced no {}",
                    output.display()
                )));
            }
            Ok(output)
        }
    }
}

/// Forward a child stream to tracing, line by line.
async fn relay<R: AsyncRead + Unpin>(stream: Option<R>) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "iptest", "{line}");
    }
}

/// Extract candidates from an iptest CSV into a `host port` file.
///
/// Rows are kept when `country` is unset or matches column 9. Repeated
/// `host:port` pairs are written once. Returns the number of candidates
/// written.
pub fn extract_iptest_csv(csv: &Path, out: &Path, country: Option<&str>) -> Result<usize> {
    let content = std::fs::read_to_string(csv)?;
    let mut rows = csv_records(content.trim_start_matches('\u{feff}')).into_iter();

    let columns = rows.next().map_or(0, |h| h.len());
    if columns < IPTEST_MIN_COLUMNS {
        return Err(Error::parse(format!(
            "{} has {columns} columns, expected at least {IPTEST_MIN_COLUMNS}",
            csv.display()
        )));
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for row in rows {
        let (Some(ip), Some(port), Some(row_country)) =
            (row.first(), row.get(1), row.get(IPTEST_COUNTRY_COLUMN))
        else {
            continue;
        };
        let (ip, port) = (ip.trim(), port.trim());
        if ip.is_empty() || port.is_empty() {
            continue;
        }
        if country.is_some_and(|c| c != row_country.trim()) {
            continue;
        }
        let candidate = Candidate::new(ip, port);
        if seen.insert(candidate.clone()) {
            candidates.push(candidate);
        }
    }

    CandidateSource::save(out, &candidates)?;
    match country {
        Some(c) => tracing::info!(
            "extracted {} candidates in `{c}` from {}",
            candidates.len(),
            csv.display()
        ),
        None => tracing::info!("extracted {} candidates from {}", candidates.len(), csv.display()),
    }
    Ok(candidates.len())
}
