//! proxyprobe - concurrent reverse-proxy IP checker
//!
//! Binary entry point for the proxyprobe CLI application.

#![warn(clippy::all, warnings)]
#![warn(clippy::pedantic, clippy::nursery)]

use clap::CommandFactory;
use color_eyre::eyre::WrapErr;
use proxyprobe::cli::{Cli, Commands, OutputFormat, OverrideArgs};
use proxyprobe::config::{CheckSettings, ConfigLoader};
use proxyprobe::output::OutputPaths;
use proxyprobe::pipeline::{Pipeline, RunSummary};
use proxyprobe::probe::{HttpTransport, SuccessRecord};
use proxyprobe::source::IptestRunner;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set up logging based on verbosity level.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging
/// * `quiet` - Enable error-level only logging
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .init();
}

/// Load settings and apply command-line overrides.
fn load_settings(config: Option<&Path>, overrides: OverrideArgs) -> color_eyre::Result<CheckSettings> {
    let mut settings = ConfigLoader::load(config).wrap_err("failed to load settings")?;
    settings.apply(overrides.into());
    settings.validate()?;
    Ok(settings)
}

/// Run a full check over `input` and print the summary.
async fn run_check(
    input: PathBuf,
    out_dir: Option<PathBuf>,
    iptest: Option<PathBuf>,
    settings: CheckSettings,
    format: OutputFormat,
    quiet: bool,
) -> color_eyre::Result<()> {
    let paths = OutputPaths::for_input(&input, out_dir.as_deref())?;
    let transport = HttpTransport::new(settings.timeout()).wrap_err("failed to build HTTP client")?;
    let pipeline = Pipeline::new(paths, settings, transport)?;
    let checker = iptest.map(IptestRunner::new);

    let mut progress_error = None;
    let summary = pipeline
        .run(&input, checker.as_ref(), |done, total| {
            if quiet || progress_error.is_some() {
                return;
            }
            if let Err(e) = print_progress(&mut std::io::stdout(), done, total) {
                progress_error = Some(e);
            }
        })
        .await
        .wrap_err_with(|| format!("check run over {} failed", input.display()))?;

    if let Some(e) = progress_error {
        return Err(e).wrap_err("failed to write progress");
    }
    if !quiet {
        println!("\n");
    }

    match format {
        OutputFormat::Table => print_summary(&summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Overwrite the progress line in place.
fn print_progress<W: Write>(out: &mut W, done: usize, total: usize) -> std::io::Result<()> {
    write!(out, "\rchecking [{:>4}/{}]", done, total)?;
    out.flush()
}

/// Print ranked lists and counts.
fn print_summary(summary: &RunSummary) {
    print_records("Preferred", &summary.ranking.preferred);
    print_records("All successful", &summary.ranking.all);

    println!("\n=== Summary ===");
    println!("Checked:   {}", summary.total);
    println!("Succeeded: {}", summary.succeeded);
    println!("Preferred: {}", summary.preferred);
    println!("Timed out: {}", summary.timed_out);
    println!("Failed:    {}", summary.failed);
    println!();
    println!("Success file:   {}", summary.success_path.display());
    println!("Preferred file: {}", summary.preferred_path.display());
    println!("Log file:       {}", summary.log_path.display());
}

fn print_records(title: &str, records: &[SuccessRecord]) {
    println!("{title} ({}):", records.len());
    if records.is_empty() {
        println!("  (none)");
    }
    for (idx, record) in records.iter().enumerate() {
        println!("{:>4}. {}", idx + 1, record);
    }
}

/// Show the effective settings, optionally saving them.
fn run_config(config: Option<&Path>, write: bool, overrides: OverrideArgs) -> color_eyre::Result<()> {
    let settings = load_settings(config, overrides)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);

    if write {
        let path = config.map_or_else(ConfigLoader::default_path, Path::to_path_buf);
        ConfigLoader::save(&settings, &path)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        println!("saved to: {}", path.display());
    }
    Ok(())
}

/// Main entry point for the proxyprobe CLI application.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let (cli, verbose) = proxyprobe::cli::parse_verbose();
    setup_logging(verbose, cli.quiet);

    tracing::debug!("proxyprobe starting...");

    match cli.command {
        Commands::Check {
            input,
            out_dir,
            iptest,
            overrides,
        } => {
            let settings = load_settings(cli.config.as_deref(), overrides)?;
            run_check(input, out_dir, iptest, settings, cli.format, cli.quiet).await?;
        }

        Commands::Config { write, overrides } => {
            run_config(cli.config.as_deref(), write, overrides)?;
        }

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "proxyprobe", &mut std::io::stdout());
        }
    }

    Ok(())
}
