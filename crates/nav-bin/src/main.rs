//! CLI Entry Point for nav-replay
//!
//! Replays recorded sensor streams through their decoders, then plays the
//! estimator at a fixed epoch cadence and prints what it would have seen.
//!
//! # Usage
//!
//! ```bash
//! nav-replay --config config/nav.toml > epochs.csv
//! nav-replay --config config/nav.toml --output epochs.csv --summary summary.json
//! nav-replay --config config/nav.toml --check
//! ```
//!
//! CSV rows (`epoch,stream,value`) go to stdout or `--output`; the JSON
//! summary goes to stderr or `--summary`. Logs always go to stderr.

// Global allocator
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod replay;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nav_core::config::NavConfig;
use nav_core::logging::{self, OutputFormat, TracingConfig};

use crate::replay::ReplaySummary;

#[derive(Parser)]
#[command(name = "nav-replay")]
#[command(about = "Replay recorded sensor streams at a fixed estimator cadence", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "config/nav.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "compact")]
    log_format: String,

    /// Write CSV rows to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the JSON summary to this file instead of stderr
    #[arg(long)]
    summary: Option<PathBuf>,

    /// How long to capture from live (serial) sources, in seconds
    #[arg(long, default_value = "10")]
    capture_secs: u64,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NavConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.application.log_level = level.clone();
    }
    config.validate()?;

    let format: OutputFormat = cli.log_format.parse()?;
    logging::init(TracingConfig::from_nav_config(&config)?.with_format(format))?;
    nav_driver_odometer::link();

    replay::validate_streams(&config)?;
    if cli.check {
        tracing::info!(
            streams = config.enabled_streams().len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    tracing::info!(
        application = %config.application.name,
        streams = config.enabled_streams().len(),
        epoch_interval_s = config.estimator.epoch_interval_s,
        "Starting replay"
    );

    let base_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
    let streams = replay::ingest(&config, base_dir, Duration::from_secs(cli.capture_secs)).await?;

    let totals = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let totals = replay::walk_epochs(&streams, &config.estimator, &mut out)?;
            out.flush()?;
            totals
        }
        None => {
            let mut out = io::stdout().lock();
            replay::walk_epochs(&streams, &config.estimator, &mut out)?
        }
    };

    let summary = ReplaySummary {
        application: config.application.name.clone(),
        epoch_interval_s: config.estimator.epoch_interval_s,
        tolerance_s: config.estimator.tolerance_s,
        totals,
        streams: streams.into_iter().map(|s| s.summary).collect(),
    };
    let json = serde_json::to_string_pretty(&summary)?;
    match &cli.summary {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => eprintln!("{}", json),
    }

    Ok(())
}
