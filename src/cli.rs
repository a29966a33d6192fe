//! Command-line interface (CLI) argument parsing module.
//!
//! This module provides CLI argument parsing using `clap`.
//! It supports three commands: a full check run, showing or persisting the
//! effective settings, and generating shell completions.

use crate::config::SettingsOverrides;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI argument parser using clap derive macro.
///
/// # Example
///
/// ```ignore
/// let cli = Cli::parse();
/// match cli.command {
///     Commands::Check { input, .. } => { /* ... */ }
///     Commands::Config { write, .. } => { /* ... */ }
///     Commands::Completions { shell } => { /* ... */ }
/// }
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "proxyprobe",
    version,
    about = "Concurrent reverse-proxy IP checker",
    long_about = "Checks candidate proxy endpoints against a remote check service \
                  and ranks the working ones by port and response time",
    infer_subcommands = true
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Settings file (JSON); defaults to the user config directory
    #[arg(long, global = true, env = "PROXYPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Summary output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lists (default)
    #[default]
    Table,
    /// JSON summary
    Json,
}

impl OutputFormat {
    /// Get all available output format names.
    #[must_use]
    pub fn names() -> &'static [&'static str] {
        &["table", "json"]
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown format: {}. Valid options are: {:?}",
                s,
                Self::names()
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Available commands for the proxyprobe CLI.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check every candidate in a .txt or .csv list
    ///
    /// Results are written next to the input, in a folder named after it,
    /// unless --out-dir is given.
    #[command(alias = "c")]
    Check {
        /// Candidate list (.txt with `host port` lines, or .csv export)
        input: PathBuf,

        /// Output folder
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Pre-screen candidates with this iptest binary
        #[arg(long)]
        iptest: Option<PathBuf>,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Show the effective settings
    Config {
        /// Save them to the settings file
        #[arg(long)]
        write: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Flags overriding individual settings fields.
#[derive(Debug, Clone, Default, Args)]
pub struct OverrideArgs {
    /// Maximum number of probes in flight
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-probe timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Preferred set keeps responses faster than this (ms)
    #[arg(long = "max-ms")]
    pub max_ms: Option<i64>,

    /// Preferred ports, comma separated (e.g. 443,8443)
    #[arg(long)]
    pub ports: Option<String>,

    /// Country kept from iptest results
    #[arg(long)]
    pub country: Option<String>,

    /// Datacenter kept from CSV input
    #[arg(long)]
    pub datacenter: Option<String>,

    /// Check endpoint URL
    #[arg(long = "check-url")]
    pub check_url: Option<String>,
}

impl From<OverrideArgs> for SettingsOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            check_url: args.check_url,
            timeout_secs: args.timeout,
            max_workers: args.workers,
            preferred_max_response_time_ms: args.max_ms,
            preferred_ports: args.ports,
            preferred_country: args.country,
            preferred_datacenter: args.datacenter,
        }
    }
}

/// Parse CLI arguments and return verbose flag.
///
/// # Returns
///
/// Returns a tuple of `(Cli, verbose)` where `verbose` indicates
/// whether verbose logging was enabled.
#[must_use]
pub fn parse_verbose() -> (Cli, bool) {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    (cli, verbose)
}
