//! Configuration management for EdgeCast
//!
//! Loads from config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub confidence: ConfidenceConfig,
    pub calibration: CalibrationConfig,
    pub arbitrage: ArbitrageConfig,
    pub value: ValueConfig,
    pub tiers: TierConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `config/default`, `config/local` and environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally layering an explicit file on top
    pub fn load_from(extra_file: Option<&str>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            // Simulation defaults
            .set_default("simulation.iterations", 1000)?
            // Confidence defaults
            .set_default("confidence.floor", 30.0)?
            .set_default("confidence.ceiling", 95.0)?
            // Calibration defaults
            .set_default("calibration.min_samples", 20)?
            .set_default("calibration.window_size", 200)?
            .set_default("calibration.max_spread_bias", 3.0)?
            .set_default("calibration.max_total_bias", 5.0)?
            .set_default("calibration.max_confidence_bias", 0.05)?
            .set_default("calibration.model_version", "mc-v1")?
            // Arbitrage defaults
            .set_default("arbitrage.min_profit_pct", 0.5)?
            .set_default("arbitrage.reference_stake", 1000.0)?
            .set_default("arbitrage.max_quote_skew_secs", 60)?
            // Value / Kelly defaults
            .set_default("value.edge_threshold", 5.0)?
            .set_default("value.kelly_fraction", 0.25)?
            .set_default("value.large_edge_threshold", 20.0)?
            .set_default("value.large_edge_kelly_fraction", 0.125)?
            .set_default("value.bankroll_unit", 100.0)?
            .set_default("value.min_stake", 10.0)?
            .set_default("value.max_stake", 50.0)?
            .set_default("value.high_confidence", 70.0)?
            // Tier defaults
            .set_default("tiers.confidence_weight", 1.0)?
            .set_default("tiers.edge_weight", 2.0)?
            .set_default("tiers.factor_weight", 2.0)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config = builder
            // Override with environment variables (EDGECAST__<SECTION>__<KEY>)
            .add_source(Environment::with_prefix("EDGECAST").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.fill_missing_sports();
        app_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(app_config)
    }

    /// Sports absent from a partial `simulation.sports` table keep built-in profiles
    fn fill_missing_sports(&mut self) {
        for (sport, profile) in default_sport_profiles() {
            self.simulation.sports.entry(sport).or_insert(profile);
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.simulation.validate()?;
        self.confidence.validate()?;
        self.calibration.validate()?;
        self.arbitrage.validate()?;
        self.value.validate()?;
        self.tiers.validate()?;
        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "iterations={} seed={:?} confidence=[{}, {}] edge>={} kelly={} arb_min={}% min_samples={}",
            self.simulation.iterations,
            self.simulation.seed,
            self.confidence.floor,
            self.confidence.ceiling,
            self.value.edge_threshold,
            self.value.kelly_fraction,
            self.arbitrage.min_profit_pct,
            self.calibration.min_samples
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sport;

    #[test]
    fn test_load_defaults() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.simulation.iterations, 1000);
        assert_eq!(config.value.kelly_fraction, 0.25);
        assert_eq!(config.tiers.bands.len(), 3);
        assert_eq!(config.simulation.sports.len(), Sport::ALL.len());
    }

    #[test]
    fn test_load_layered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(
            &path,
            "[simulation]\niterations = 250\n\n[simulation.sports.nhl]\nmean_total = 5.5\nstd_dev = 1.5\ndistribution = \"poisson\"\nscore_floor = 0.0\nscore_ceiling = 9.0\nhome_advantage = 0.25\nhome_bias_boost = 4.0\naway_penalty = 4.0\nmarket_ceiling_margin = 18.0\n",
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.simulation.iterations, 250);
        assert_eq!(config.simulation.profile(Sport::Nhl).mean_total, 5.5);
        // Untouched sports keep their defaults
        assert_eq!(config.simulation.profile(Sport::Nba).mean_total, 224.0);
    }

    #[test]
    fn test_env_overrides_file_values() {
        std::env::set_var("EDGECAST__ARBITRAGE__REFERENCE_STAKE", "2500");
        let loaded = AppConfig::load();
        std::env::remove_var("EDGECAST__ARBITRAGE__REFERENCE_STAKE");

        let config = loaded.unwrap();
        assert_eq!(config.arbitrage.reference_stake, 2500.0);
        assert_eq!(config.arbitrage.max_quote_skew_secs, 60);
    }

    #[test]
    fn test_digest_mentions_key_knobs() {
        let digest = AppConfig::default().digest();
        assert!(digest.contains("iterations=1000"));
        assert!(digest.contains("kelly=0.25"));
    }
}
