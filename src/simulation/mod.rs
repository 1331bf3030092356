//! Monte Carlo Game Simulator
//!
//! Uses the market only as a prior for each side's scoring rate, then plays
//! N independent trials. Ties are pushes and stay out of the win-probability
//! denominator.

pub mod confidence;
pub mod sampler;

pub use confidence::{clamp_confidence, line_confidence, moneyline_confidence, ConfidenceOutcome};
pub use sampler::MIN_EXPECTED_SCORE;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{CalibrationState, ResolvedPrediction};
use crate::config::{ConfidenceConfig, SimulationConfig, SportProfile};
use crate::error::{EngineError, Result};
use crate::odds::{self, QuoteBook};
use crate::types::{GameContext, GameKey, HistoricalResult, MarketType, Side, Sport};

/// Market-derived inputs for one game
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrior {
    pub home_implied: f64,
    pub away_implied: f64,
    /// Consensus home spread line
    pub spread_line: Option<f64>,
    /// Consensus total line
    pub total_line: Option<f64>,
}

impl MarketPrior {
    /// Consensus prior from the current-cycle quotes.
    ///
    /// Fails when either moneyline side is missing: no default probability is substituted.
    pub fn from_book(book: &QuoteBook<'_>) -> Result<Self> {
        let home = book.consensus_implied(MarketType::Moneyline, Side::Home);
        let away = book.consensus_implied(MarketType::Moneyline, Side::Away);
        let (home_implied, away_implied) = match (home, away) {
            (Some(h), Some(a)) => (h, a),
            (h, a) => {
                return Err(EngineError::insufficient(
                    book.game().key().to_string(),
                    format!(
                        "moneyline quotes missing for {}",
                        match (h, a) {
                            (None, None) => "both sides",
                            (None, _) => "home side",
                            _ => "away side",
                        }
                    ),
                ))
            }
        };
        let prior = Self {
            home_implied,
            away_implied,
            spread_line: book.consensus_line(MarketType::Spread),
            total_line: book.consensus_line(MarketType::Total),
        };
        prior.validate(&book.game().key())?;
        Ok(prior)
    }

    pub fn from_moneyline(home_odds: i32, away_odds: i32) -> Result<Self> {
        Ok(Self {
            home_implied: odds::implied_probability(home_odds)?,
            away_implied: odds::implied_probability(away_odds)?,
            spread_line: None,
            total_line: None,
        })
    }

    pub fn validate(&self, game: &GameKey) -> Result<()> {
        let usable = |p: f64| p.is_finite() && p > 0.0 && p < 1.0;
        if !usable(self.home_implied) || !usable(self.away_implied) {
            return Err(EngineError::insufficient(
                game.to_string(),
                format!(
                    "implied probabilities ({}, {}) are not usable",
                    self.home_implied, self.away_implied
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub p5: f64,
    pub p95: f64,
}

/// Outcome split of a spread or total market at one line.
///
/// `cover` is home-covers for spreads and over for totals. All three are
/// fractions of every trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineProbabilities {
    pub line: f64,
    pub cover: f64,
    pub fail: f64,
    pub push: f64,
}

impl LineProbabilities {
    /// Probability of `side` winning with pushes refunded
    pub fn decided_probability(&self, market: MarketType, side: Side) -> Option<f64> {
        let decided = self.cover + self.fail;
        if decided <= 0.0 {
            return None;
        }
        match (market, side) {
            (MarketType::Spread, Side::Home) | (MarketType::Total, Side::Over) => {
                Some(self.cover / decided)
            }
            (MarketType::Spread, Side::Away) | (MarketType::Total, Side::Under) => {
                Some(self.fail / decided)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub game: GameKey,
    pub sport: Sport,
    pub iterations: usize,
    /// Trials with a winner
    pub completed_trials: usize,
    pub home_win_probability: f64,
    pub away_win_probability: f64,
    /// Share of all trials that tied
    pub push_probability: f64,
    pub expected_home_score: f64,
    pub expected_away_score: f64,
    pub home_score_band: ScoreBand,
    pub away_score_band: ScoreBand,
    pub mean_margin: f64,
    pub mean_total: f64,
    pub spread: Option<LineProbabilities>,
    pub total: Option<LineProbabilities>,
    /// Pre-calibration values, fed back into calibration once the game resolves
    pub raw_home_win_probability: f64,
    pub raw_expected_home_score: f64,
    pub raw_expected_away_score: f64,
    pub calibration_version: u64,
}

impl SimulationResult {
    pub fn win_probability(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => Some(self.home_win_probability),
            Side::Away => Some(self.away_win_probability),
            _ => None,
        }
    }

    pub fn line(&self, market: MarketType) -> Option<&LineProbabilities> {
        match market {
            MarketType::Spread => self.spread.as_ref(),
            MarketType::Total => self.total.as_ref(),
            MarketType::Moneyline => None,
        }
    }
}

/// Per-game prediction handed to the detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub game: GameKey,
    pub sport: Sport,
    pub simulation: SimulationResult,
    pub prior: MarketPrior,
    pub predicted_side: Side,
    pub raw_confidence: f64,
    /// Final confidence, 0-100, inside the configured band
    pub confidence: f64,
    pub market_implied_probability: f64,
    pub calibration_version: u64,
    pub generated_at: DateTime<Utc>,
}

impl Prediction {
    /// Pair with the final score for the next calibration recompute
    pub fn resolve(&self, result: HistoricalResult) -> ResolvedPrediction {
        ResolvedPrediction {
            result,
            predicted_home_score: self.simulation.raw_expected_home_score,
            predicted_away_score: self.simulation.raw_expected_away_score,
            predicted_home_win_probability: self.simulation.raw_home_win_probability,
        }
    }
}

/// Seeded Monte Carlo simulator
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: SimulationConfig,
    confidence: ConfidenceConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: SimulationConfig, confidence: ConfidenceConfig) -> Result<Self> {
        config.validate()?;
        confidence.validate()?;
        Ok(Self { config, confidence })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn profile(&self, sport: Sport) -> SportProfile {
        self.config.profile(sport)
    }

    /// Expected (home, away) scores from the prior, before calibration
    pub fn expected_scores(&self, profile: &SportProfile, prior: &MarketPrior) -> (f64, f64) {
        let total = prior
            .total_line
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(profile.mean_total);
        let sum = prior.home_implied + prior.away_implied;
        let home = total * (prior.home_implied / sum) + profile.home_advantage;
        let away = total * (prior.away_implied / sum);
        (home.max(MIN_EXPECTED_SCORE), away.max(MIN_EXPECTED_SCORE))
    }

    /// Run the configured number of trials for one game
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        game: &GameContext,
        prior: &MarketPrior,
        calibration: &CalibrationState,
        rng: &mut R,
    ) -> Result<SimulationResult> {
        let key = game.key();
        prior.validate(&key)?;

        let profile = self.config.profile(game.sport);
        let (lambda_home, lambda_away) = self.expected_scores(&profile, prior);
        let n = self.config.iterations;

        let mut home_scores = Vec::with_capacity(n);
        let mut away_scores = Vec::with_capacity(n);
        let mut home_wins = 0usize;
        let mut away_wins = 0usize;

        for _ in 0..n {
            let h = sampler::sample_score(profile.distribution, lambda_home, profile.std_dev, rng)
                .clamp(profile.score_floor, profile.score_ceiling);
            let a = sampler::sample_score(profile.distribution, lambda_away, profile.std_dev, rng)
                .clamp(profile.score_floor, profile.score_ceiling);
            if h > a {
                home_wins += 1;
            } else if a > h {
                away_wins += 1;
            }
            home_scores.push(h);
            away_scores.push(a);
        }

        let completed = home_wins + away_wins;
        if completed == 0 {
            return Err(EngineError::insufficient(
                key.to_string(),
                format!("all {n} trials tied"),
            ));
        }

        let nf = n as f64;
        let raw_home_win = home_wins as f64 / completed as f64;
        let raw_expected_home = home_scores.iter().sum::<f64>() / nf;
        let raw_expected_away = away_scores.iter().sum::<f64>() / nf;

        // Calibration: spread bias moves the margin, total bias the sum
        let home_shift = (calibration.spread_bias + calibration.total_bias) / 2.0;
        let away_shift = (calibration.total_bias - calibration.spread_bias) / 2.0;
        let home_win = (raw_home_win + calibration.confidence_bias).clamp(0.0, 1.0);

        let spread = prior.spread_line.map(|line| {
            line_split(&home_scores, &away_scores, line, |h, a| {
                h - a + calibration.spread_bias + line
            })
        });
        let total = prior.total_line.map(|line| {
            line_split(&home_scores, &away_scores, line, |h, a| {
                h + a + calibration.total_bias - line
            })
        });

        let mean_margin = raw_expected_home - raw_expected_away + calibration.spread_bias;
        let mean_total = raw_expected_home + raw_expected_away + calibration.total_bias;

        home_scores.sort_by(|a, b| a.total_cmp(b));
        away_scores.sort_by(|a, b| a.total_cmp(b));
        let band = |sorted: &[f64], shift: f64| ScoreBand {
            p5: (sampler::percentile(sorted, 0.05) + shift).max(0.0),
            p95: (sampler::percentile(sorted, 0.95) + shift).max(0.0),
        };

        debug!(
            game = %key,
            lambda_home,
            lambda_away,
            home_wins,
            away_wins,
            pushes = n - completed,
            "Simulation complete"
        );

        Ok(SimulationResult {
            game: key,
            sport: game.sport,
            iterations: n,
            completed_trials: completed,
            home_win_probability: home_win,
            away_win_probability: 1.0 - home_win,
            push_probability: (n - completed) as f64 / nf,
            expected_home_score: (raw_expected_home + home_shift).max(0.0),
            expected_away_score: (raw_expected_away + away_shift).max(0.0),
            home_score_band: band(&home_scores, home_shift),
            away_score_band: band(&away_scores, away_shift),
            mean_margin,
            mean_total,
            spread,
            total,
            raw_home_win_probability: raw_home_win,
            raw_expected_home_score: raw_expected_home,
            raw_expected_away_score: raw_expected_away,
            calibration_version: calibration.version,
        })
    }

    /// `simulate` with a fresh `StdRng` from `seed`
    pub fn simulate_seeded(
        &self,
        game: &GameContext,
        prior: &MarketPrior,
        calibration: &CalibrationState,
        seed: u64,
    ) -> Result<SimulationResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.simulate(game, prior, calibration, &mut rng)
    }

    /// Simulate and derive the moneyline pick and its confidence
    pub fn predict<R: Rng + ?Sized>(
        &self,
        game: &GameContext,
        prior: &MarketPrior,
        calibration: &CalibrationState,
        rng: &mut R,
    ) -> Result<Prediction> {
        let simulation = self.simulate(game, prior, calibration, rng)?;
        let profile = self.config.profile(game.sport);
        let outcome = moneyline_confidence(
            simulation.home_win_probability,
            simulation.away_win_probability,
            simulation.expected_home_score,
            simulation.expected_away_score,
            prior.home_implied,
            prior.away_implied,
            &profile,
            &self.confidence,
        );
        let market_implied_probability = match outcome.side {
            Side::Home => prior.home_implied,
            _ => prior.away_implied,
        };

        Ok(Prediction {
            game: simulation.game.clone(),
            sport: game.sport,
            calibration_version: simulation.calibration_version,
            simulation,
            prior: *prior,
            predicted_side: outcome.side,
            raw_confidence: outcome.raw,
            confidence: outcome.confidence,
            market_implied_probability,
            generated_at: Utc::now(),
        })
    }
}

/// Split trials by the sign of `diff(home, away)`: positive covers, zero pushes
fn line_split<F>(home: &[f64], away: &[f64], line: f64, diff: F) -> LineProbabilities
where
    F: Fn(f64, f64) -> f64,
{
    let n = home.len().max(1) as f64;
    let (mut cover, mut fail, mut push) = (0usize, 0usize, 0usize);
    for (h, a) in home.iter().zip(away) {
        let d = diff(*h, *a);
        if d.abs() < 1e-9 {
            push += 1;
        } else if d > 0.0 {
            cover += 1;
        } else {
            fail += 1;
        }
    }
    LineProbabilities {
        line,
        cover: cover as f64 / n,
        fail: fail as f64 / n,
        push: push as f64 / n,
    }
}
