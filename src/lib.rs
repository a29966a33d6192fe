//! proxyprobe - a concurrent reverse-proxy IP checker.
//!
//! This crate provides both a library API and a CLI tool for:
//! - Checking candidate `host port` endpoints against a remote check service
//! - Running the checks with a bounded number of probes in flight
//! - Ranking working endpoints by port, then response time
//! - Splitting out a preferred set by latency and port allow-list
//!
//! # Library Usage
//!
//! ```ignore
//! use proxyprobe::{CheckSettings, HttpTransport, OutputPaths, Pipeline};
//!
//! let settings = CheckSettings::default();
//! let paths = OutputPaths::for_input(Path::new("hk.txt"), None)?;
//! let transport = HttpTransport::new(settings.timeout())?;
//! let summary = Pipeline::new(paths, settings, transport)?
//!     .run(Path::new("hk.txt"), None::<&IptestRunner>, |_, _| {})
//!     .await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Check a list, results land in ./hk/
//! proxyprobe check hk.txt
//! proxyprobe check hk.csv --datacenter HKG --ports 443,8443 --max-ms 200
//!
//! # Pre-screen with iptest first
//! proxyprobe check hk.txt --iptest ./iptest --country HK
//!
//! # Show or persist settings
//! proxyprobe config --workers 32 --write
//! ```
//!
//! # Features
//!
//! - **Isolated failures**: a malformed line, timeout, or bad reply only
//!   affects its own outcome
//! - **Diagnostic log**: one block per candidate, never interleaved
//! - **Deterministic output**: ranked files are identical across reruns
//!   with the same results

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod source;

// Re-export commonly used types
pub use cli::{Cli, Commands, OutputFormat};
pub use config::{CheckSettings, ConfigLoader};
pub use error::{Error, Result};
pub use output::{DiagnosticLog, OutputPaths, ResultSink};
pub use pipeline::{Pipeline, RunSummary};
pub use probe::{
    rank, Candidate, CheckTransport, Executor, HttpTransport, PreferredFilter, ProbeOutcome,
    ProbeWorker, Ranking, SuccessRecord,
};
pub use source::{CandidateSource, ExternalChecker, IptestRunner};
