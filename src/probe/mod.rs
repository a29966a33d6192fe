//! Probe module.
//!
//! This module provides the concurrent validation pipeline core:
//! - Core data types (candidates, outcomes, success records)
//! - The probe worker and its HTTP transport
//! - The bounded concurrency executor
//! - Ranking and partitioning of the results

pub mod executor;
pub mod ranking;
pub mod types;
pub mod worker;

pub use executor::Executor;
pub use ranking::{rank, PreferredFilter, Ranking};
pub use types::*;
pub use worker::{CheckTransport, HttpTransport, ProbeWorker};
