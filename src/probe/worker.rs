//! Probe worker: checks one candidate against the remote check endpoint.
//!
//! A probe issues a single request with a hard wall-clock timeout and
//! classifies the result. It never fails; every error is folded into the
//! returned [`ProbeOutcome`], which is appended to the diagnostic log
//! before it is handed back.

#![allow(clippy::missing_errors_doc)]

use crate::error::Result;
use crate::output::DiagnosticLog;
use crate::probe::types::{Candidate, CheckReply, ProbeOutcome};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default check endpoint.
pub const DEFAULT_CHECK_URL: &str = "https://check.proxyip.eytan.qzz.io/check";

/// Default timeout for each probe in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// User agent sent to the check endpoint.
const USER_AGENT: &str = concat!("proxyprobe/", env!("CARGO_PKG_VERSION"));

/// Raw reply of the check endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Transport-level failure of a check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete in time
    Timeout,
    /// Connection refused, DNS failure, TLS error, ...
    Failed(String),
}

/// How a probe reaches the check endpoint.
pub trait CheckTransport: Send + Sync + 'static {
    /// Fetch `url` and return the status and body.
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<CheckResponse, TransportError>> + Send;
}

/// [`CheckTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl CheckTransport for HttpTransport {
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<CheckResponse, TransportError>> + Send {
        let request = self.client.get(url);
        async move {
            let response = request.send().await.map_err(classify_reqwest_error)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(classify_reqwest_error)?;
            Ok(CheckResponse { status, body })
        }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(e.to_string())
    }
}

/// Checks single candidates and records each outcome in the diagnostic log.
pub struct ProbeWorker<T> {
    transport: T,
    check_url: String,
    timeout: Duration,
    log: Arc<DiagnosticLog>,
}

impl<T: CheckTransport> ProbeWorker<T> {
    /// Create a worker with the default endpoint and timeout.
    pub fn new(transport: T, log: Arc<DiagnosticLog>) -> Self {
        Self {
            transport,
            check_url: DEFAULT_CHECK_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log,
        }
    }

    #[must_use]
    pub fn with_check_url(mut self, url: impl Into<String>) -> Self {
        self.check_url = url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The diagnostic log this worker appends to.
    #[must_use]
    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Check URL for a candidate: `<check_url>?proxyip=<host>:<port>`.
    #[must_use]
    pub fn url_for(&self, candidate: &Candidate) -> String {
        let sep = if self.check_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}proxyip={}", self.check_url, candidate.label())
    }

    /// Probe one `host port` line.
    pub async fn probe(&self, line: &str) -> ProbeOutcome {
        let outcome = self.classify(line).await;
        tracing::debug!(
            candidate = %outcome.candidate,
            success = outcome.success,
            response_time_ms = outcome.response_time_ms,
            "probe finished"
        );
        self.record(outcome).await
    }

    /// Append an outcome produced outside [`probe`](Self::probe) to the log.
    pub async fn record(&self, outcome: ProbeOutcome) -> ProbeOutcome {
        self.log.append(&outcome).await;
        outcome
    }

    async fn classify(&self, line: &str) -> ProbeOutcome {
        let Some(candidate) = Candidate::parse(line) else {
            return ProbeOutcome::malformed(
                line.trim(),
                format!("invalid candidate format: expected `host port`, got `{}`", line.trim()),
            );
        };

        let url = self.url_for(&candidate);
        match tokio::time::timeout(self.timeout, self.transport.fetch(&url)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => ProbeOutcome::timed_out(&candidate),
            Ok(Err(TransportError::Failed(e))) => ProbeOutcome::transport_failure(&candidate, e),
            Ok(Ok(response)) => {
                let status = i32::from(response.status);
                let body = response.body.trim().to_string();
                match CheckReply::from_body(&body) {
                    Ok(reply) => ProbeOutcome::replied(&candidate, body, status, &reply),
                    Err(e) => {
                        tracing::debug!("unparsable reply for {candidate}: {e}");
                        ProbeOutcome::unparsable(&candidate, body, status)
                    }
                }
            }
        }
    }
}
