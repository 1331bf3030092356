//! Backtesting Module
//!
//! Grades emitted picks against final scores:
//! - win/loss/push per market (moneyline, spread, total)
//! - profit, ROI, profit factor, max drawdown
//! - per-tier breakdown

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::odds;
use crate::persistence::{GradedPickRecord, ReportWriter};
use crate::types::{GameKey, HistoricalResult, MarketType, Pick, Side, Sport, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Win,
    Loss,
    Push,
}

impl std::fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetOutcome::Win => write!(f, "win"),
            BetOutcome::Loss => write!(f, "loss"),
            BetOutcome::Push => write!(f, "push"),
        }
    }
}

/// A pick after its game resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedPick {
    pub pick_id: Uuid,
    pub game: GameKey,
    pub sport: Sport,
    pub market: MarketType,
    pub side: Side,
    pub line: Option<f64>,
    pub bookmaker: String,
    pub american_odds: i32,
    pub confidence: f64,
    pub edge: f64,
    pub tier: Option<Tier>,
    pub stake: f64,
    pub outcome: BetOutcome,
    pub pnl: f64,
    pub resolved_at: DateTime<Utc>,
}

/// Win/loss/push of a pick given the final score.
///
/// None when the pick needs a line it does not carry.
pub fn grade(pick: &Pick, result: &HistoricalResult) -> Option<BetOutcome> {
    let diff = match (pick.market, pick.side) {
        (MarketType::Moneyline, Side::Home) => result.margin(),
        (MarketType::Moneyline, Side::Away) => -result.margin(),
        (MarketType::Spread, Side::Home) => result.margin() + pick.line?,
        (MarketType::Spread, Side::Away) => -result.margin() + pick.line?,
        (MarketType::Total, Side::Over) => result.total() - pick.line?,
        (MarketType::Total, Side::Under) => pick.line? - result.total(),
        _ => return None,
    };
    Some(if diff.abs() < 1e-9 {
        BetOutcome::Push
    } else if diff > 0.0 {
        BetOutcome::Win
    } else {
        BetOutcome::Loss
    })
}

/// Backtest performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Graded picks, pushes included
    pub total_picks: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    /// Wins over decided picks (0.0 to 1.0)
    pub win_rate: f64,
    pub total_staked: f64,
    pub profit: f64,
    /// Profit over total staked
    pub roi: f64,
    /// Gross profit / gross loss
    pub profit_factor: f64,
    /// Largest peak-to-trough drop of cumulative profit, in units
    pub max_drawdown: f64,
    /// Average profit per pick
    pub expectancy: f64,
    pub avg_confidence: f64,
    pub avg_edge: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub overall: BacktestMetrics,
    /// Keyed by tier name, "untiered" for picks without one
    pub by_tier: BTreeMap<String, BacktestMetrics>,
    /// Picks whose game had no result
    pub unresolved: usize,
}

/// Backtester
#[derive(Debug, Default)]
pub struct Backtester {
    /// Graded picks in resolution order
    trades: Vec<GradedPick>,
    unresolved: usize,
}

impl Backtester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grade every pick whose game has a result
    pub fn run(&mut self, picks: &[Pick], results: &[HistoricalResult]) -> BacktestReport {
        self.trades.clear();
        self.unresolved = 0;

        let by_game: HashMap<&GameKey, &HistoricalResult> =
            results.iter().map(|r| (&r.game, r)).collect();

        for pick in picks {
            let Some(result) = by_game.get(&pick.game) else {
                self.unresolved += 1;
                continue;
            };
            let Some(outcome) = grade(pick, result) else {
                debug!(pick = %pick.id, market = %pick.market, "Pick cannot be graded");
                self.unresolved += 1;
                continue;
            };
            let pnl = match outcome {
                BetOutcome::Win => odds::payout(pick.recommended_stake, pick.american_odds)
                    .map(|gross| gross - pick.recommended_stake)
                    .unwrap_or(0.0),
                BetOutcome::Loss => -pick.recommended_stake,
                BetOutcome::Push => 0.0,
            };
            self.trades.push(GradedPick {
                pick_id: pick.id,
                game: pick.game.clone(),
                sport: pick.sport,
                market: pick.market,
                side: pick.side,
                line: pick.line,
                bookmaker: pick.bookmaker.clone(),
                american_odds: pick.american_odds,
                confidence: pick.confidence,
                edge: pick.edge,
                tier: pick.tier,
                stake: pick.recommended_stake,
                outcome,
                pnl,
                resolved_at: result.resolved_at,
            });
        }
        self.trades.sort_by_key(|t| t.resolved_at);

        let report = self.report();
        info!(
            graded = report.overall.total_picks,
            unresolved = report.unresolved,
            win_rate = report.overall.win_rate,
            roi = report.overall.roi,
            "📊 Backtest complete"
        );
        report
    }

    pub fn report(&self) -> BacktestReport {
        let mut groups: BTreeMap<String, Vec<&GradedPick>> = BTreeMap::new();
        for t in &self.trades {
            let key = t
                .tier
                .map(|tier| tier.to_string().to_lowercase())
                .unwrap_or_else(|| "untiered".to_string());
            groups.entry(key).or_default().push(t);
        }
        let all: Vec<&GradedPick> = self.trades.iter().collect();

        BacktestReport {
            overall: calculate_metrics(&all),
            by_tier: groups
                .into_iter()
                .map(|(k, v)| (k, calculate_metrics(&v)))
                .collect(),
            unresolved: self.unresolved,
        }
    }

    /// Get all graded picks
    pub fn get_trades(&self) -> &[GradedPick] {
        &self.trades
    }

    /// Export graded picks to CSV
    pub fn export_trades_csv(&self, path: &Path) -> anyhow::Result<()> {
        let records: Vec<GradedPickRecord> = self.trades.iter().map(GradedPickRecord::from).collect();
        ReportWriter::write_records(path, &records)
    }
}

/// Calculate performance metrics from graded picks, in resolution order
pub fn calculate_metrics(trades: &[&GradedPick]) -> BacktestMetrics {
    if trades.is_empty() {
        return BacktestMetrics::default();
    }

    let count = |o: BetOutcome| trades.iter().filter(|t| t.outcome == o).count();
    let wins = count(BetOutcome::Win);
    let losses = count(BetOutcome::Loss);
    let pushes = count(BetOutcome::Push);
    let decided = wins + losses;
    let win_rate = if decided > 0 {
        wins as f64 / decided as f64
    } else {
        0.0
    };

    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl.abs()).sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let total_staked: f64 = trades.iter().map(|t| t.stake).sum();
    let profit: f64 = trades.iter().map(|t| t.pnl).sum();
    let roi = if total_staked > 0.0 {
        profit / total_staked
    } else {
        0.0
    };

    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for t in trades {
        equity += t.pnl;
        peak = peak.max(equity);
        max_drawdown = max_drawdown.max(peak - equity);
    }

    let n = trades.len() as f64;
    BacktestMetrics {
        total_picks: trades.len(),
        wins,
        losses,
        pushes,
        win_rate,
        total_staked,
        profit,
        roi,
        profit_factor,
        max_drawdown,
        expectancy: profit / n,
        avg_confidence: trades.iter().map(|t| t.confidence).sum::<f64>() / n,
        avg_edge: trades.iter().map(|t| t.edge).sum::<f64>() / n,
    }
}
