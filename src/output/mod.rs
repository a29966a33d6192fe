//! Output module.
//!
//! Persists the results of a run: the ranked success files and the
//! diagnostic log shared by the probe workers.

pub mod log;
pub mod sink;

pub use log::DiagnosticLog;
pub use sink::{OutputPaths, ResultSink};
