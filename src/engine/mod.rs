//! Batch prediction engine
//!
//! One batch = one calibration snapshot + one seed. Games run in parallel and
//! fail independently; the manifest says which games made it and why the
//! others did not.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::calibration::CalibrationSnapshot;
use crate::config::AppConfig;
use crate::detector::{ArbitrageScanner, ValueDetector};
use crate::error::{EngineError, Result};
use crate::odds::{QuoteBook, QuoteRejection};
use crate::simulation::{MarketPrior, MonteCarloSimulator, Prediction};
use crate::tiering::{TierAllocation, TierAllocator};
use crate::types::{ArbitrageOpportunity, GameKey, GameOdds, Pick};

/// A game that produced no prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedGame {
    pub game: GameKey,
    pub kind: String,
    pub reason: String,
}

impl SkippedGame {
    fn new(game: GameKey, error: &EngineError) -> Self {
        Self {
            game,
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_id: Uuid,
    /// Replays the batch bit-for-bit with the same inputs and snapshot
    pub seed: u64,
    pub model_version: String,
    pub calibration_taken_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub games_total: usize,
    pub succeeded: Vec<GameKey>,
    pub skipped: Vec<SkippedGame>,
    pub rejected_quotes: Vec<QuoteRejection>,
    pub stale_quotes_dropped: usize,
    pub picks_emitted: usize,
    pub arbitrage_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub manifest: BatchManifest,
    pub predictions: Vec<Prediction>,
    pub arbitrage: Vec<ArbitrageOpportunity>,
    pub allocation: TierAllocation,
}

/// Everything one game contributes to the batch
struct GameRun {
    game: GameKey,
    prediction: Result<Prediction>,
    picks: Vec<Pick>,
    arbitrage: Vec<ArbitrageOpportunity>,
    rejections: Vec<QuoteRejection>,
    stale_dropped: usize,
}

/// Simulator, detectors and allocator wired from one config
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    simulator: MonteCarloSimulator,
    arbitrage: ArbitrageScanner,
    value: ValueDetector,
    tiers: TierAllocator,
    default_seed: Option<u64>,
}

impl PredictionEngine {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            simulator: MonteCarloSimulator::new(config.simulation.clone(), config.confidence.clone())?,
            arbitrage: ArbitrageScanner::new(config.arbitrage.clone()),
            value: ValueDetector::new(config.value.clone(), config.confidence.clone()),
            tiers: TierAllocator::new(config.tiers.clone())?,
            default_seed: config.simulation.seed,
        })
    }

    pub fn simulator(&self) -> &MonteCarloSimulator {
        &self.simulator
    }

    /// Run one batch.
    ///
    /// Seed precedence: argument, then `simulation.seed`, then random. Game
    /// `i` uses `seed + i`.
    pub fn run_batch(
        &self,
        games: &[GameOdds],
        snapshot: &CalibrationSnapshot,
        seed: Option<u64>,
    ) -> BatchReport {
        let started_at = Utc::now();
        let seed = seed.or(self.default_seed).unwrap_or_else(rand::random);
        let batch_id = Uuid::new_v4();
        info!(%batch_id, games = games.len(), seed, "🎲 Batch started");

        let runs: Vec<GameRun> = games
            .par_iter()
            .enumerate()
            .map(|(i, game)| self.run_game(game, snapshot, seed.wrapping_add(i as u64)))
            .collect();

        let mut predictions = Vec::new();
        let mut arbitrage = Vec::new();
        let mut candidates = Vec::new();
        let mut succeeded = Vec::new();
        let mut skipped = Vec::new();
        let mut rejected_quotes = Vec::new();
        let mut stale_quotes_dropped = 0;

        for run in runs {
            match run.prediction {
                Ok(prediction) => {
                    succeeded.push(run.game);
                    predictions.push(prediction);
                }
                Err(e) => {
                    warn!(game = %run.game, error = %e, "Game skipped");
                    skipped.push(SkippedGame::new(run.game, &e));
                }
            }
            candidates.extend(run.picks);
            arbitrage.extend(run.arbitrage);
            rejected_quotes.extend(run.rejections);
            stale_quotes_dropped += run.stale_dropped;
        }

        let picks_emitted = candidates.len();
        let allocation = self.tiers.allocate(candidates);

        let manifest = BatchManifest {
            batch_id,
            seed,
            model_version: snapshot.model_version.clone(),
            calibration_taken_at: snapshot.taken_at,
            started_at,
            finished_at: Utc::now(),
            games_total: games.len(),
            succeeded,
            skipped,
            rejected_quotes,
            stale_quotes_dropped,
            picks_emitted,
            arbitrage_found: arbitrage.len(),
        };
        info!(
            %batch_id,
            succeeded = manifest.succeeded.len(),
            skipped = manifest.skipped.len(),
            rejected_quotes = manifest.rejected_quotes.len(),
            picks = picks_emitted,
            arbitrage = manifest.arbitrage_found,
            "✅ Batch complete"
        );

        BatchReport {
            manifest,
            predictions,
            arbitrage,
            allocation,
        }
    }

    fn run_game(&self, odds: &GameOdds, snapshot: &CalibrationSnapshot, seed: u64) -> GameRun {
        let game = &odds.game;
        let key = game.key();
        let (book, rejections) =
            QuoteBook::build(game, &odds.quotes, self.arbitrage.config().max_quote_skew_secs);

        // Arbitrage needs no model, so it runs even when prediction fails
        let arbitrage = self.arbitrage.scan(&book);

        let calibration = snapshot.state(game.sport);
        let mut rng = StdRng::seed_from_u64(seed);
        let prediction = MarketPrior::from_book(&book)
            .and_then(|prior| self.simulator.predict(game, &prior, &calibration, &mut rng));

        let picks = match &prediction {
            Ok(p) => self
                .value
                .scan(p, &book, &self.simulator.profile(game.sport)),
            Err(_) => Vec::new(),
        };

        GameRun {
            game: key,
            prediction,
            picks,
            arbitrage,
            rejections,
            stale_dropped: book.stale_dropped(),
        }
    }
}
