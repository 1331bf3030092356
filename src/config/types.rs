//! Configuration sections
//!
//! Each section carries its own defaults so components can be built in tests
//! without going through the file/env loader.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::types::{Sport, Tier};

/// Score distribution family used by the Monte Carlo sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreDistribution {
    /// Low-scoring sports (hockey, baseball)
    Poisson,
    /// High-scoring sports (football, basketball)
    Normal,
}

/// Sport-specific scoring-rate profile and confidence tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportProfile {
    /// Expected combined score of both sides
    pub mean_total: f64,
    /// Per-side standard deviation (normal family only)
    pub std_dev: f64,
    pub distribution: ScoreDistribution,
    pub score_floor: f64,
    pub score_ceiling: f64,
    /// Points added to the home side's expected score
    pub home_advantage: f64,
    /// Confidence points added when the model picks the stronger home side
    pub home_bias_boost: f64,
    /// Confidence points removed when the model picks the away side
    pub away_penalty: f64,
    /// Confidence may not exceed market implied (in points) plus this margin
    pub market_ceiling_margin: f64,
}

impl SportProfile {
    pub fn default_for(sport: Sport) -> Self {
        use ScoreDistribution::{Normal, Poisson};
        let (mean_total, std_dev, distribution, floor, ceiling, home_adv, margin) = match sport {
            Sport::Nfl => (48.0, 10.0, Normal, 0.0, 60.0, 2.5, 15.0),
            Sport::Ncaaf => (56.0, 14.0, Normal, 0.0, 70.0, 3.5, 15.0),
            Sport::Nba => (224.0, 12.0, Normal, 70.0, 150.0, 3.0, 10.0),
            Sport::Ncaab => (144.0, 11.0, Normal, 40.0, 110.0, 4.0, 10.0),
            Sport::Nhl => (6.0, 1.7, Poisson, 0.0, 10.0, 0.3, 20.0),
            Sport::Mlb => (9.0, 2.5, Poisson, 0.0, 15.0, 0.2, 20.0),
        };
        Self {
            mean_total,
            std_dev,
            distribution,
            score_floor: floor,
            score_ceiling: ceiling,
            home_advantage: home_adv,
            home_bias_boost: 5.0,
            away_penalty: 5.0,
            market_ceiling_margin: margin,
        }
    }

    pub fn validate(&self, sport: Sport) -> Result<()> {
        if !(self.mean_total > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "{sport}: mean_total must be positive"
            )));
        }
        if self.std_dev < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "{sport}: std_dev must not be negative"
            )));
        }
        if self.score_floor > self.score_ceiling {
            return Err(EngineError::InvalidConfig(format!(
                "{sport}: score_floor {} above score_ceiling {}",
                self.score_floor, self.score_ceiling
            )));
        }
        Ok(())
    }
}

pub fn default_sport_profiles() -> HashMap<Sport, SportProfile> {
    Sport::ALL
        .iter()
        .map(|sport| (*sport, SportProfile::default_for(*sport)))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Trials per game
    pub iterations: usize,
    /// Fixed batch seed for reproducible runs; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_sport_profiles")]
    pub sports: HashMap<Sport, SportProfile>,
}

impl SimulationConfig {
    pub const MIN_ITERATIONS: usize = 100;

    /// Profile for a sport, falling back to the built-in default
    pub fn profile(&self, sport: Sport) -> SportProfile {
        self.sports
            .get(&sport)
            .cloned()
            .unwrap_or_else(|| SportProfile::default_for(sport))
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations < Self::MIN_ITERATIONS {
            return Err(EngineError::InvalidConfig(format!(
                "simulation.iterations {} below minimum {}",
                self.iterations,
                Self::MIN_ITERATIONS
            )));
        }
        for (sport, profile) in &self.sports {
            profile.validate(*sport)?;
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: None,
            sports: default_sport_profiles(),
        }
    }
}

/// Global confidence band. 100 is never reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    pub floor: f64,
    pub ceiling: f64,
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..100.0).contains(&self.floor)
            || !(0.0..100.0).contains(&self.ceiling)
            || self.floor > self.ceiling
        {
            return Err(EngineError::InvalidConfig(format!(
                "confidence band [{}, {}] must satisfy 0 <= floor <= ceiling < 100",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            floor: 30.0,
            ceiling: 95.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Resolved games required before biases move
    pub min_samples: usize,
    /// Most recent resolved games considered per recompute
    pub window_size: usize,
    /// Clamp for spread bias, in points
    pub max_spread_bias: f64,
    /// Clamp for total bias, in points
    pub max_total_bias: f64,
    /// Clamp for confidence bias, in probability units
    pub max_confidence_bias: f64,
    pub model_version: String,
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(EngineError::InvalidConfig(
                "calibration.min_samples must be at least 1".to_string(),
            ));
        }
        if self.window_size < self.min_samples {
            return Err(EngineError::InvalidConfig(format!(
                "calibration.window_size {} smaller than min_samples {}",
                self.window_size, self.min_samples
            )));
        }
        if self.max_spread_bias < 0.0 || self.max_total_bias < 0.0 {
            return Err(EngineError::InvalidConfig(
                "calibration bias bounds must not be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_confidence_bias) {
            return Err(EngineError::InvalidConfig(
                "calibration.max_confidence_bias must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples: 20,
            window_size: 200,
            max_spread_bias: 3.0,
            max_total_bias: 5.0,
            max_confidence_bias: 0.05,
            model_version: "mc-v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    /// Minimum guaranteed profit, in percent of total stake
    pub min_profit_pct: f64,
    /// Total stake split across the legs
    pub reference_stake: f64,
    /// Quotes older than the newest quote of the market by more than this are stale
    pub max_quote_skew_secs: i64,
}

impl ArbitrageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_profit_pct < 0.0 || !(self.reference_stake > 0.0) || self.max_quote_skew_secs < 0
        {
            return Err(EngineError::InvalidConfig(
                "arbitrage thresholds must be non-negative and reference_stake positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: 0.5,
            reference_stake: 1000.0,
            max_quote_skew_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueConfig {
    /// Minimum edge in percentage points
    pub edge_threshold: f64,
    /// Fraction of full Kelly, strictly between 0 and 1
    pub kelly_fraction: f64,
    /// Edges at or above this (points) size with `large_edge_kelly_fraction`
    pub large_edge_threshold: f64,
    pub large_edge_kelly_fraction: f64,
    pub bankroll_unit: f64,
    pub min_stake: f64,
    pub max_stake: f64,
    /// Confidence at which a pick earns the high-confidence factor
    pub high_confidence: f64,
}

impl ValueConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, f) in [
            ("kelly_fraction", self.kelly_fraction),
            ("large_edge_kelly_fraction", self.large_edge_kelly_fraction),
        ] {
            if !(f > 0.0 && f < 1.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "value.{name} {f} must be strictly between 0 and 1"
                )));
            }
        }
        if self.min_stake < 0.0 || self.min_stake > self.max_stake {
            return Err(EngineError::InvalidConfig(format!(
                "value stake bounds [{}, {}] are inverted",
                self.min_stake, self.max_stake
            )));
        }
        if !(self.bankroll_unit > 0.0) {
            return Err(EngineError::InvalidConfig(
                "value.bankroll_unit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 5.0,
            kelly_fraction: 0.25,
            large_edge_threshold: 20.0,
            large_edge_kelly_fraction: 0.125,
            bankroll_unit: 100.0,
            min_stake: 10.0,
            max_stake: 50.0,
            high_confidence: 70.0,
        }
    }
}

/// Score band of one tier. Bands are ordered best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub tier: Tier,
    /// Inclusive lower bound; the upper bound is the previous band's minimum
    pub min_score: f64,
    pub min_count: usize,
    #[serde(default)]
    pub max_count: Option<usize>,
}

pub fn default_tier_bands() -> Vec<TierBand> {
    vec![
        TierBand {
            tier: Tier::Elite,
            min_score: 80.0,
            min_count: 5,
            max_count: None,
        },
        TierBand {
            tier: Tier::Pro,
            min_score: 65.0,
            min_count: 3,
            max_count: None,
        },
        TierBand {
            tier: Tier::Free,
            min_score: 0.0,
            min_count: 2,
            max_count: Some(10),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub confidence_weight: f64,
    pub edge_weight: f64,
    pub factor_weight: f64,
    #[serde(default = "default_tier_bands")]
    pub bands: Vec<TierBand>,
}

impl TierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(EngineError::InvalidConfig(
                "tiers.bands must not be empty".to_string(),
            ));
        }
        for pair in self.bands.windows(2) {
            if pair[1].min_score >= pair[0].min_score {
                return Err(EngineError::InvalidConfig(format!(
                    "tier {} min_score {} must be below tier {} min_score {}",
                    pair[1].tier, pair[1].min_score, pair[0].tier, pair[0].min_score
                )));
            }
        }
        for band in &self.bands {
            if let Some(max) = band.max_count {
                if max < band.min_count {
                    return Err(EngineError::InvalidConfig(format!(
                        "tier {} max_count {} below min_count {}",
                        band.tier, max, band.min_count
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            confidence_weight: 1.0,
            edge_weight: 2.0,
            factor_weight: 2.0,
            bands: default_tier_bands(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for calibration state and CSV reports
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sections_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(ConfidenceConfig::default().validate().is_ok());
        assert!(CalibrationConfig::default().validate().is_ok());
        assert!(ArbitrageConfig::default().validate().is_ok());
        assert!(ValueConfig::default().validate().is_ok());
        assert!(TierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_low_iteration_count_rejected() {
        let config = SimulationConfig {
            iterations: 99,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_full_kelly_rejected() {
        let config = ValueConfig {
            kelly_fraction: 1.0,
            ..ValueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_confidence_band_rejected() {
        let config = ConfidenceConfig {
            floor: 80.0,
            ceiling: 60.0,
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_stake_bounds_rejected() {
        let config = ValueConfig {
            min_stake: 60.0,
            max_stake: 50.0,
            ..ValueConfig::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_tier_bands_must_descend() {
        let mut config = TierConfig::default();
        config.bands[1].min_score = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_scoring_sports_use_poisson() {
        assert_eq!(
            SportProfile::default_for(Sport::Nhl).distribution,
            ScoreDistribution::Poisson
        );
        assert_eq!(
            SportProfile::default_for(Sport::Nba).distribution,
            ScoreDistribution::Normal
        );
    }
}
