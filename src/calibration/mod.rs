//! Calibration Store
//!
//! Rolling bias corrections learned from resolved games:
//! - spread bias: mean(actual margin - predicted margin)
//! - total bias: mean(actual total - predicted total)
//! - confidence bias: mean(home won - predicted home win probability)
//!
//! Biases are clamped to configured bounds. A recompute with too few resolved
//! games keeps the previous state.

pub mod metrics;
pub mod repository;

pub use metrics::{ReliabilityBin, ReliabilityMetrics};
pub use repository::{
    CalibrationRepository, InMemoryCalibrationRepository, JsonFileCalibrationRepository,
};

#[cfg(test)]
pub use repository::MockCalibrationRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::CalibrationConfig;
use crate::error::{EngineError, Result};
use crate::types::{GameOutcome, HistoricalResult, Sport};

/// Bias terms for one sport and model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub sport: Sport,
    pub model_version: String,
    /// Bumped on every successful recompute
    pub version: u64,
    pub spread_bias: f64,
    pub total_bias: f64,
    pub confidence_bias: f64,
    pub sample_count: usize,
    #[serde(default)]
    pub brier_score: Option<f64>,
    #[serde(default)]
    pub ece: Option<f64>,
    /// None until the first recompute
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CalibrationState {
    /// Zero biases, never recomputed
    pub fn neutral(sport: Sport, model_version: &str) -> Self {
        Self {
            sport,
            model_version: model_version.to_string(),
            version: 0,
            spread_bias: 0.0,
            total_bias: 0.0,
            confidence_bias: 0.0,
            sample_count: 0,
            brier_score: None,
            ece: None,
            last_updated: None,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.spread_bias == 0.0 && self.total_bias == 0.0 && self.confidence_bias == 0.0
    }
}

/// A resolved game paired with what the model predicted for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPrediction {
    pub result: HistoricalResult,
    pub predicted_home_score: f64,
    pub predicted_away_score: f64,
    pub predicted_home_win_probability: f64,
}

impl ResolvedPrediction {
    pub fn predicted_margin(&self) -> f64 {
        self.predicted_home_score - self.predicted_away_score
    }

    pub fn predicted_total(&self) -> f64 {
        self.predicted_home_score + self.predicted_away_score
    }
}

/// Compute a new state from the most recent `window_size` resolved games of `sport`.
///
/// Fails with `CalibrationUnderflow` below `min_samples`.
pub fn compute_calibration(
    sport: Sport,
    previous: &CalibrationState,
    history: &[ResolvedPrediction],
    config: &CalibrationConfig,
    now: DateTime<Utc>,
) -> Result<CalibrationState> {
    let mut window: Vec<&ResolvedPrediction> =
        history.iter().filter(|r| r.result.sport == sport).collect();
    window.sort_by(|a, b| b.result.resolved_at.cmp(&a.result.resolved_at));
    window.truncate(config.window_size);

    if window.len() < config.min_samples {
        return Err(EngineError::CalibrationUnderflow {
            sport,
            samples: window.len(),
            required: config.min_samples,
        });
    }

    let n = window.len() as f64;
    let spread_bias = window
        .iter()
        .map(|r| r.result.margin() - r.predicted_margin())
        .sum::<f64>()
        / n;
    let total_bias = window
        .iter()
        .map(|r| r.result.total() - r.predicted_total())
        .sum::<f64>()
        / n;

    // Draws have no home-win indicator
    let mut reliability = ReliabilityMetrics::default();
    for r in &window {
        match r.result.outcome() {
            GameOutcome::HomeWin => reliability.record(r.predicted_home_win_probability, true),
            GameOutcome::AwayWin => reliability.record(r.predicted_home_win_probability, false),
            GameOutcome::Draw => {}
        }
    }
    let confidence_bias = reliability.mean_residual().unwrap_or(0.0);

    Ok(CalibrationState {
        sport,
        model_version: config.model_version.clone(),
        version: previous.version + 1,
        spread_bias: spread_bias.clamp(-config.max_spread_bias, config.max_spread_bias),
        total_bias: total_bias.clamp(-config.max_total_bias, config.max_total_bias),
        confidence_bias: confidence_bias
            .clamp(-config.max_confidence_bias, config.max_confidence_bias),
        sample_count: window.len(),
        brier_score: reliability.brier_score(),
        ece: reliability.ece(),
        last_updated: Some(now),
    })
}

/// Read-once view of every sport's calibration, taken at batch start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub model_version: String,
    pub taken_at: DateTime<Utc>,
    states: HashMap<Sport, CalibrationState>,
}

impl CalibrationSnapshot {
    /// All sports neutral
    pub fn neutral(model_version: &str) -> Self {
        Self::from_states(model_version, Vec::new())
    }

    /// Sports missing from `states` are neutral
    pub fn from_states(model_version: &str, states: Vec<CalibrationState>) -> Self {
        let mut map: HashMap<Sport, CalibrationState> =
            states.into_iter().map(|s| (s.sport, s)).collect();
        for sport in Sport::ALL {
            map.entry(sport)
                .or_insert_with(|| CalibrationState::neutral(sport, model_version));
        }
        Self {
            model_version: model_version.to_string(),
            taken_at: Utc::now(),
            states: map,
        }
    }

    pub fn state(&self, sport: Sport) -> CalibrationState {
        self.states
            .get(&sport)
            .cloned()
            .unwrap_or_else(|| CalibrationState::neutral(sport, &self.model_version))
    }
}

/// Calibration get/recompute over a repository
pub struct CalibrationStore<R: CalibrationRepository> {
    repository: R,
    config: CalibrationConfig,
}

impl<R: CalibrationRepository> CalibrationStore<R> {
    pub fn new(repository: R, config: CalibrationConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Current state for a sport, neutral if none was ever stored
    pub fn get_calibration(&self, sport: Sport) -> Result<CalibrationState> {
        Ok(self
            .repository
            .load(sport, &self.config.model_version)?
            .unwrap_or_else(|| CalibrationState::neutral(sport, &self.config.model_version)))
    }

    /// Recompute and persist. Underflow returns the previous state unchanged.
    pub fn recompute(
        &self,
        sport: Sport,
        history: &[ResolvedPrediction],
    ) -> Result<CalibrationState> {
        let previous = self.get_calibration(sport)?;
        match compute_calibration(sport, &previous, history, &self.config, Utc::now()) {
            Ok(next) => {
                self.repository.save(&next)?;
                info!(
                    %sport,
                    version = next.version,
                    samples = next.sample_count,
                    spread_bias = next.spread_bias,
                    total_bias = next.total_bias,
                    confidence_bias = next.confidence_bias,
                    "Calibration recomputed"
                );
                Ok(next)
            }
            Err(EngineError::CalibrationUnderflow {
                samples, required, ..
            }) => {
                warn!(%sport, samples, required, "Calibration underflow, keeping previous state");
                Ok(previous)
            }
            Err(e) => Err(e),
        }
    }

    /// Consistent snapshot of every sport for one batch
    pub fn snapshot(&self) -> Result<CalibrationSnapshot> {
        let mut states = Vec::with_capacity(Sport::ALL.len());
        for sport in Sport::ALL {
            states.push(self.get_calibration(sport)?);
        }
        Ok(CalibrationSnapshot::from_states(
            &self.config.model_version,
            states,
        ))
    }
}
