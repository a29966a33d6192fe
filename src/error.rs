//! Error types module.
//!
//! Only run-level failures live here: bad configuration, unusable input,
//! and I/O failures on the result files. Per-candidate failures are
//! recorded inside [`ProbeOutcome`](crate::probe::ProbeOutcome) and never
//! surface as an `Error`.

use thiserror::Error;

/// A specialized `Result` type for proxyprobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the proxyprobe application.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (result files, diagnostic log, input files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (configuration files)
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (invalid values, missing files)
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error (unsupported input format, malformed CSV)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The candidate source yielded nothing worth probing
    #[error("no valid candidates in {0}")]
    NoCandidates(String),

    /// The external checker binary failed or produced no output
    #[error("external checker failed: {0}")]
    ExternalChecker(String),
}

impl Error {
    /// Create a new configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new parse error with a message.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new external checker error with a message.
    #[must_use]
    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalChecker(msg.into())
    }

    /// Create a "no candidates" error naming the source that was empty.
    #[must_use]
    pub fn no_candidates(source: impl std::fmt::Display) -> Self {
        Self::NoCandidates(source.to_string())
    }
}
