mod render;
mod validate;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sheetscout_engine::{FeasibilityEngine, ScoringPolicy};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Score how feasible it is to automate an Excel workbook.
#[derive(Parser, Debug)]
#[command(name = "sheetscout", version, about)]
struct Cli {
    /// Workbook to analyze (.xlsx, .xlsm, .xls, .xlsb, .ods or .json)
    file: PathBuf,

    /// Print the full report as JSON instead of the text summary
    #[arg(long)]
    json: bool,

    /// Print nothing to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Skip writing the report file
    #[arg(long, conflicts_with = "export")]
    no_export: bool,

    /// Report file path [default: <stem>_automation_report.txt next to the input]
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// YAML scoring policy overriding the built-in defaults
    #[arg(long, value_name = "YAML")]
    policy: Option<PathBuf>,

    /// Reject workbooks larger than this many megabytes
    #[arg(long, value_name = "MB", default_value_t = 100.0)]
    max_size_mb: f64,

    /// Log analysis progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SHEETSCOUT_LOG")
        .or_else(|_| EnvFilter::try_new(default))
        .context("failed to create tracing filter")?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init()
        .context("failed to initialize tracing")?;
    Ok(())
}

fn load_policy(path: Option<&PathBuf>) -> Result<ScoringPolicy> {
    let Some(path) = path else {
        return Ok(ScoringPolicy::default());
    };
    let file = File::open(path)
        .with_context(|| format!("cannot open policy {}", path.display()))?;
    ScoringPolicy::from_yaml_reader(BufReader::new(file))
        .with_context(|| format!("invalid policy {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let size = validate::validate_file(&cli.file, cli.max_size_mb)?;
    debug!(path = %cli.file.display(), size, "input validated");

    let policy = load_policy(cli.policy.as_ref())?;
    let engine = FeasibilityEngine::new(policy).context("scoring policy rejected")?;

    let workbook = sheetscout_model::load_workbook(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let report = engine.analyze(&workbook);
    info!(
        composite = report.composite(),
        effort = report.effort().label(),
        "analysis complete"
    );

    if !cli.quiet {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render::render_report(&report, &cli.file, None)?);
        }
    }

    if !cli.no_export {
        let target = cli
            .export
            .clone()
            .unwrap_or_else(|| render::default_export_path(&cli.file));
        let text = render::render_report(&report, &cli.file, Some(chrono::Local::now()))?;
        std::fs::write(&target, text)
            .with_context(|| format!("cannot write report to {}", target.display()))?;
        info!(path = %target.display(), "report exported");
        if !cli.quiet && !cli.json {
            println!("Report saved to {}", target.display());
        }
    }

    Ok(())
}
