//! Seatcast - batch seat forecast for the House of Representatives.
//!
//! Reads the input tables as JSON, runs every model and writes the output
//! tables as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use seatcast_common::config::ForecastConfig;
use seatcast_common::config_loader::{check_modular_files, load_forecast_config};
use seatcast_common::logging::init_logging_with_exclusions;
use seatcast_engine::{ForecastEngine, ForecastInputs, ForecastOutput};

/// Seat prediction and apportionment engine.
#[derive(Parser, Debug)]
#[command(name = "seatcast")]
#[command(version)]
#[command(about = "Forecast district winners and proportional seats from signal tables.", long_about = None)]
struct Cli {
    /// Input tables (JSON)
    #[arg(short, long)]
    inputs: PathBuf,

    /// Single configuration file (overrides --config-dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding modular configuration files (default: ~/.seatcast)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of districts in the closest-race ranking
    #[arg(long)]
    top: Option<usize>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

fn load_config(cli: &Cli) -> Result<ForecastConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ForecastConfig::load_from(path)?;
            config.apply_env_overrides();
            config
        }
        None => load_forecast_config(cli.config_dir.clone())?,
    };
    if let Some(top) = cli.top {
        config.analytics.closest_race_count = top;
    }
    Ok(config)
}

fn log_summary(output: &ForecastOutput) {
    for row in &output.model_seats {
        if row.total > 0 {
            tracing::info!(
                model = %row.model,
                party = %row.party,
                district = row.district,
                proportional = row.proportional,
                total = row.total,
                "Seats"
            );
        }
    }
    for row in output.coalitions.iter().filter(|r| r.total.majority) {
        tracing::info!(model = %row.model, coalition = %row.total.coalition, seats = row.total.seats, "Majority");
    }
    for failure in &output.failures {
        tracing::warn!(model = %failure.model, kind = %failure.kind, "{}", failure.error);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    tracing::info!("Seatcast v{}", env!("CARGO_PKG_VERSION"));
    if cli.config.is_none() {
        for (file, found) in check_modular_files(cli.config_dir.clone()) {
            tracing::debug!(file = %file, found, "Modular config file");
        }
    }

    let content = fs::read_to_string(&cli.inputs)
        .with_context(|| format!("Failed to read inputs from {}", cli.inputs.display()))?;
    let inputs: ForecastInputs = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse inputs from {}", cli.inputs.display()))?;

    let engine = ForecastEngine::new(config)?;
    let output = engine.run(&inputs)?;
    log_summary(&output);

    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    match &cli.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write output to {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    tracing::info!(run_id = %output.run.run_id, "Forecast written");
    Ok(())
}
