//! Probe types and data structures.
//!
//! This module provides the candidate representation, the per-probe
//! outcome record, the parsed reply of the check endpoint, and the
//! success records that the ranking stage orders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response time recorded when none is known.
pub const NO_RESPONSE_TIME: i64 = -1;

/// Status code recorded when no reply was received.
pub const NO_STATUS: i32 = -1;

/// Error text for a probe that hit its wall-clock timeout.
pub const TIMEOUT_MESSAGE: &str = "request timed out";

/// Error text for a reply body that is not a valid check reply.
pub const PARSE_FAILURE_MESSAGE: &str = "response parse failure";

/// Sort key assigned to records whose port is not numeric.
pub const SENTINEL_PORT: u32 = 65_536;

/// Sort key response time paired with [`SENTINEL_PORT`].
pub const SENTINEL_RESPONSE_TIME: i64 = 99_999;

/// A single `host port` pair to be probed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Host or IP address as supplied by ingestion
    pub host: String,
    /// Port as supplied by ingestion (not validated)
    pub port: String,
}

impl Candidate {
    /// Create a new candidate.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Parse a `host port` line.
    ///
    /// The line must split into exactly two whitespace-separated fields.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let c = Candidate::parse("1.1.1.1 443").unwrap();
    /// assert_eq!(c.label(), "1.1.1.1:443");
    /// ```
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let host = fields.next()?;
        let port = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(host, port))
    }

    /// The `host:port` label used in URLs and output files.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The `host port` line stored in candidate files.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{} {}", self.host, self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Remote port as reported by the check endpoint.
///
/// Normally a JSON number, but some deployments send a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RemotePort {
    Number(u64),
    Text(String),
}

impl fmt::Display for RemotePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Reply body of the check endpoint.
///
/// `success` is mandatory; a body without it is a parse failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckReply {
    /// Whether the endpoint could reach the proxy
    pub success: bool,
    /// Round-trip time measured by the endpoint, in milliseconds
    #[serde(rename = "responseTime", default)]
    pub response_time: Option<f64>,
    /// IP the endpoint actually reached
    #[serde(rename = "proxyIP", default)]
    pub proxy_ip: Option<String>,
    /// Port the endpoint actually reached
    #[serde(rename = "portRemote", default)]
    pub port_remote: Option<RemotePort>,
}

impl CheckReply {
    /// Parse a reply body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the body is not a check reply object.
    pub fn from_body(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Response time rounded to whole milliseconds, or [`NO_RESPONSE_TIME`].
    #[must_use]
    pub fn response_time_ms(&self) -> i64 {
        match self.response_time {
            Some(t) if t.is_finite() && t >= 0.0 => t.round() as i64,
            _ => NO_RESPONSE_TIME,
        }
    }
}

/// Result of probing one candidate.
///
/// Every failure mode is captured here as data; a probe never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// The candidate as it was submitted
    pub candidate: String,
    /// Host the endpoint reports having reached
    pub observed_host: String,
    /// Port the endpoint reports having reached
    pub observed_port: String,
    /// Whether the proxy is usable
    pub success: bool,
    /// Response time in milliseconds, [`NO_RESPONSE_TIME`] if unknown
    pub response_time_ms: i64,
    /// Raw reply body
    pub stdout: String,
    /// Error text
    pub stderr: String,
    /// HTTP status code, [`NO_STATUS`] when no reply arrived
    pub exit_code: i32,
}

impl ProbeOutcome {
    fn failed(candidate: &Candidate, stderr: impl Into<String>) -> Self {
        Self {
            candidate: candidate.label(),
            observed_host: candidate.host.clone(),
            observed_port: candidate.port.clone(),
            success: false,
            response_time_ms: NO_RESPONSE_TIME,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: NO_STATUS,
        }
    }

    /// Outcome for an input line that is not a `host port` pair.
    pub fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            candidate: raw.to_string(),
            observed_host: String::new(),
            observed_port: String::new(),
            success: false,
            response_time_ms: NO_RESPONSE_TIME,
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: NO_STATUS,
        }
    }

    /// Outcome for a probe that exceeded its timeout.
    #[must_use]
    pub fn timed_out(candidate: &Candidate) -> Self {
        Self::failed(candidate, TIMEOUT_MESSAGE)
    }

    /// Outcome for a connection, DNS, or TLS failure.
    pub fn transport_failure(candidate: &Candidate, error: impl Into<String>) -> Self {
        Self::failed(candidate, error)
    }

    /// Outcome for a probe task that panicked or was aborted.
    pub fn internal_fault(raw: &str, error: impl fmt::Display) -> Self {
        Self::malformed(raw, format!("internal fault: {error}"))
    }

    /// Outcome for a reply that could not be parsed.
    #[must_use]
    pub fn unparsable(candidate: &Candidate, body: String, status: i32) -> Self {
        Self {
            stdout: body,
            exit_code: status,
            ..Self::failed(candidate, PARSE_FAILURE_MESSAGE)
        }
    }

    /// Outcome for a parsed reply.
    ///
    /// `proxyIP` and `portRemote` override the observed host and port.
    #[must_use]
    pub fn replied(candidate: &Candidate, body: String, status: i32, reply: &CheckReply) -> Self {
        let observed_host = reply
            .proxy_ip
            .clone()
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| candidate.host.clone());
        let observed_port = reply
            .port_remote
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| candidate.port.clone());

        Self {
            candidate: candidate.label(),
            observed_host,
            observed_port,
            success: reply.success,
            response_time_ms: reply.response_time_ms(),
            stdout: body,
            stderr: String::new(),
            exit_code: status,
        }
    }

    /// The observed `host:port` label, or the raw candidate for malformed input.
    #[must_use]
    pub fn label(&self) -> String {
        if self.observed_host.is_empty() && self.observed_port.is_empty() {
            self.candidate.clone()
        } else {
            format!("{}:{}", self.observed_host, self.observed_port)
        }
    }

    /// Check if the outcome is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        !self.success && self.stderr == TIMEOUT_MESSAGE
    }

    /// The success record for this outcome, if it counts as a success.
    #[must_use]
    pub fn success_record(&self) -> Option<SuccessRecord> {
        (self.success && self.response_time_ms != NO_RESPONSE_TIME).then(|| SuccessRecord {
            host: self.observed_host.clone(),
            port: self.observed_port.clone(),
            response_time_ms: self.response_time_ms,
        })
    }
}

/// A responsive proxy with its measured response time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessRecord {
    /// Observed host
    pub host: String,
    /// Observed port
    pub port: String,
    /// Response time in milliseconds
    pub response_time_ms: i64,
}

impl SuccessRecord {
    /// Create a new success record.
    pub fn new(host: impl Into<String>, port: impl Into<String>, response_time_ms: i64) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            response_time_ms,
        }
    }

    /// The `host:port` label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Numeric port, if the port is a decimal number.
    #[must_use]
    pub fn port_number(&self) -> Option<u32> {
        self.port.parse().ok()
    }

    /// `(port, response time)` ordering key.
    ///
    /// Non-numeric ports map to the sentinel pair so they sort last.
    #[must_use]
    pub fn sort_key(&self) -> (u32, i64) {
        self.port_number()
            .map(|port| (port, self.response_time_ms))
            .unwrap_or((SENTINEL_PORT, SENTINEL_RESPONSE_TIME))
    }

    /// Output file line: `host:port#<ms>ms`.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}#{}ms", self.label(), self.response_time_ms)
    }
}

impl fmt::Display for SuccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({}ms)", self.host, self.port, self.response_time_ms)
    }
}
