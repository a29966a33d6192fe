//! Source module.
//!
//! Everything that happens before probing:
//! - Ingestion of `.txt` / `.csv` proxy lists
//! - The optional external `iptest` pre-screen
//! - Loading the final candidate list

pub mod candidates;
pub mod ingest;
pub mod iptest;

pub use candidates::{CandidateList, CandidateSource};
pub use ingest::{ingest_file, InputFormat, IngestReport};
pub use iptest::{extract_iptest_csv, ExternalChecker, IptestRunner};
