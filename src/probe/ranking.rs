//! Ranking and partitioning of probe outcomes.
//!
//! Successful outcomes are ordered by numeric port, then response time,
//! and split into the full success set and the preferred subset.

use crate::probe::types::{ProbeOutcome, SuccessRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Default preferred response-time threshold in milliseconds.
pub const DEFAULT_PREFERRED_MAX_MS: i64 = 350;

/// Criteria for the preferred subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredFilter {
    /// Records must respond strictly faster than this
    pub max_response_time_ms: i64,
    /// Allowed ports; empty means any port
    pub ports: Vec<String>,
}

impl Default for PreferredFilter {
    fn default() -> Self {
        Self {
            max_response_time_ms: DEFAULT_PREFERRED_MAX_MS,
            ports: Vec::new(),
        }
    }
}

impl PreferredFilter {
    /// Check if a record belongs in the preferred subset.
    #[must_use]
    pub fn accepts(&self, record: &SuccessRecord) -> bool {
        record.response_time_ms < self.max_response_time_ms
            && (self.ports.is_empty() || self.ports.iter().any(|p| *p == record.port))
    }
}

/// Ordered success sets of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking {
    /// Every success, ordered by (port, response time)
    pub all: Vec<SuccessRecord>,
    /// Successes passing the [`PreferredFilter`], same ordering
    pub preferred: Vec<SuccessRecord>,
}

/// Total order used for both output files.
///
/// Host and then port text break ties so repeated runs write identical files.
#[must_use]
pub fn compare(a: &SuccessRecord, b: &SuccessRecord) -> Ordering {
    a.sort_key()
        .cmp(&b.sort_key())
        .then_with(|| a.host.cmp(&b.host))
        .then_with(|| a.port.cmp(&b.port))
}

/// Build the ranked sets from a batch of outcomes.
///
/// Outcomes may arrive in any order. When several outcomes report the same
/// observed `host:port`, only the fastest is kept.
#[must_use]
pub fn rank(outcomes: &[ProbeOutcome], filter: &PreferredFilter) -> Ranking {
    let mut fastest: HashMap<String, SuccessRecord> = HashMap::new();
    for record in outcomes.iter().filter_map(ProbeOutcome::success_record) {
        fastest
            .entry(record.label())
            .and_modify(|kept| {
                if record.response_time_ms < kept.response_time_ms {
                    *kept = record.clone();
                }
            })
            .or_insert(record);
    }

    let mut all: Vec<SuccessRecord> = fastest.into_values().collect();
    all.sort_by(compare);

    // Filtering a sorted list keeps it sorted.
    let preferred = all.iter().filter(|r| filter.accepts(r)).cloned().collect();

    Ranking { all, preferred }
}
