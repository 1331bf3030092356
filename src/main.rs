//! EdgeCast batch runner
//!
//! Usage: edgecast <games.json> [output_dir]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use edgecast::calibration::{CalibrationStore, JsonFileCalibrationRepository};
use edgecast::config::{AppConfig, LoggingConfig};
use edgecast::engine::PredictionEngine;
use edgecast::persistence::ReportWriter;
use edgecast::types::GameOdds;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(games_path) = args.next().map(PathBuf::from) else {
        bail!("usage: edgecast <games.json> [output_dir]");
    };

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);
    info!("⚙️ Config: {}", config);

    let output_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.persistence.data_dir).join("reports"));

    let raw = std::fs::read_to_string(&games_path)
        .with_context(|| format!("Failed to read {}", games_path.display()))?;
    let games: Vec<GameOdds> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse games from {}", games_path.display()))?;
    info!("📥 Loaded {} games from {}", games.len(), games_path.display());

    let repository = JsonFileCalibrationRepository::new(&config.persistence.data_dir)?;
    let store = CalibrationStore::new(repository, config.calibration.clone());
    let snapshot = store.snapshot()?;

    let engine = PredictionEngine::new(&config)?;
    let report = tokio::task::spawn_blocking(move || engine.run_batch(&games, &snapshot, None))
        .await
        .context("Batch task panicked")?;

    let writer = ReportWriter::new(&output_dir)?;
    let picks = writer.write_picks(&report.allocation)?;
    let arbitrage = writer.write_arbitrage(&report.arbitrage)?;
    let rejections = writer.write_rejections(&report.manifest.rejected_quotes)?;
    info!(
        picks = %picks.display(),
        arbitrage = %arbitrage.display(),
        rejections = %rejections.display(),
        "💾 Reports written"
    );

    println!("{}", serde_json::to_string_pretty(&report.manifest)?);
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // stdout carries the manifest
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
