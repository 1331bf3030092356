//! CSV Persistence Module
//!
//! Flat CSV reports of a batch: tiered picks, arbitrage legs, rejected quotes
//! and graded picks.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backtesting::GradedPick;
use crate::odds::QuoteRejection;
use crate::tiering::TierAllocation;
use crate::types::{ArbitrageOpportunity, Pick};

pub const PICKS_FILE: &str = "picks.csv";
pub const ARBITRAGE_FILE: &str = "arbitrage.csv";
pub const REJECTIONS_FILE: &str = "rejections.csv";

/// Pick record for CSV storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    pub id: String,
    pub tier: String,
    pub game: String,
    pub sport: String,
    pub market: String,
    pub side: String,
    #[serde(default)]
    pub line: Option<f64>,
    pub bookmaker: String,
    pub american_odds: i32,
    pub confidence: f64,
    pub market_implied_probability: f64,
    pub edge: f64,
    pub expected_value: f64,
    pub value_label: String,
    pub kelly_fraction: f64,
    pub recommended_stake: f64,
    pub composite_score: f64,
    /// Pipe-separated factor names
    pub factors: String,
    pub generated_at: i64,
}

impl From<&Pick> for PickRecord {
    fn from(p: &Pick) -> Self {
        Self {
            id: p.id.to_string(),
            tier: p
                .tier
                .map(|t| t.to_string().to_lowercase())
                .unwrap_or_default(),
            game: p.game.to_string(),
            sport: p.sport.key().to_string(),
            market: p.market.to_string(),
            side: p.side.to_string().to_lowercase(),
            line: p.line,
            bookmaker: p.bookmaker.clone(),
            american_odds: p.american_odds,
            confidence: p.confidence,
            market_implied_probability: p.market_implied_probability,
            edge: p.edge,
            expected_value: p.expected_value,
            value_label: p.value_label.to_string(),
            kelly_fraction: p.kelly_fraction,
            recommended_stake: p.recommended_stake,
            composite_score: p.composite_score,
            factors: p.factors.join("|"),
            generated_at: p.generated_at.timestamp_millis(),
        }
    }
}

/// One row per arbitrage leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageLegRecord {
    pub game: String,
    pub sport: String,
    pub market: String,
    pub implied_sum: f64,
    pub profit_pct: f64,
    pub guaranteed_profit: f64,
    pub bookmaker: String,
    pub side: String,
    pub american_odds: i32,
    #[serde(default)]
    pub line: Option<f64>,
    pub implied_probability: f64,
    pub stake: f64,
    pub payout: f64,
    pub captured_at: i64,
}

impl ArbitrageLegRecord {
    pub fn from_opportunity(opp: &ArbitrageOpportunity) -> Vec<Self> {
        opp.legs
            .iter()
            .map(|leg| Self {
                game: opp.game.to_string(),
                sport: opp.sport.key().to_string(),
                market: opp.market.to_string(),
                implied_sum: opp.implied_sum,
                profit_pct: opp.profit_pct,
                guaranteed_profit: opp.guaranteed_profit,
                bookmaker: leg.bookmaker.clone(),
                side: leg.side.to_string().to_lowercase(),
                american_odds: leg.american_odds,
                line: leg.line,
                implied_probability: leg.implied_probability,
                stake: leg.stake,
                payout: leg.payout,
                captured_at: leg.captured_at.timestamp_millis(),
            })
            .collect()
    }
}

/// Rejected quote record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub game: String,
    pub bookmaker: String,
    pub market: String,
    pub side: String,
    pub american_odds: i32,
    pub kind: String,
    pub reason: String,
}

impl From<&QuoteRejection> for RejectionRecord {
    fn from(r: &QuoteRejection) -> Self {
        Self {
            game: r.game.to_string(),
            bookmaker: r.bookmaker.clone(),
            market: r.market.to_string(),
            side: r.side.to_string().to_lowercase(),
            american_odds: r.american_odds,
            kind: r.kind.clone(),
            reason: r.reason.clone(),
        }
    }
}

/// Graded pick record for backtest exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedPickRecord {
    pub pick_id: String,
    pub game: String,
    pub sport: String,
    pub market: String,
    pub side: String,
    #[serde(default)]
    pub line: Option<f64>,
    pub bookmaker: String,
    pub american_odds: i32,
    pub tier: String,
    pub confidence: f64,
    pub edge: f64,
    pub stake: f64,
    pub outcome: String,
    pub pnl: f64,
    pub resolved_at: i64,
}

impl From<&GradedPick> for GradedPickRecord {
    fn from(t: &GradedPick) -> Self {
        Self {
            pick_id: t.pick_id.to_string(),
            game: t.game.to_string(),
            sport: t.sport.key().to_string(),
            market: t.market.to_string(),
            side: t.side.to_string().to_lowercase(),
            line: t.line,
            bookmaker: t.bookmaker.clone(),
            american_odds: t.american_odds,
            tier: t
                .tier
                .map(|tier| tier.to_string().to_lowercase())
                .unwrap_or_default(),
            confidence: t.confidence,
            edge: t.edge,
            stake: t.stake,
            outcome: t.outcome.to_string(),
            pnl: t.pnl,
            resolved_at: t.resolved_at.timestamp_millis(),
        }
    }
}

/// Writes batch reports under one output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Create the output directory if it doesn't exist
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Tiered picks, best tier first
    pub fn write_picks(&self, allocation: &TierAllocation) -> Result<PathBuf> {
        let records: Vec<PickRecord> = allocation.all_picks().map(PickRecord::from).collect();
        let path = self.dir.join(PICKS_FILE);
        Self::write_records(&path, &records)?;
        info!(path = %path.display(), rows = records.len(), "Picks written");
        Ok(path)
    }

    pub fn write_arbitrage(&self, opportunities: &[ArbitrageOpportunity]) -> Result<PathBuf> {
        let records: Vec<ArbitrageLegRecord> = opportunities
            .iter()
            .flat_map(ArbitrageLegRecord::from_opportunity)
            .collect();
        let path = self.dir.join(ARBITRAGE_FILE);
        Self::write_records(&path, &records)?;
        info!(path = %path.display(), rows = records.len(), "Arbitrage legs written");
        Ok(path)
    }

    pub fn write_rejections(&self, rejections: &[QuoteRejection]) -> Result<PathBuf> {
        let records: Vec<RejectionRecord> = rejections.iter().map(RejectionRecord::from).collect();
        let path = self.dir.join(REJECTIONS_FILE);
        Self::write_records(&path, &records)?;
        Ok(path)
    }

    /// Replace `path` with a headed CSV of `records`
    pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for record in records {
            writer
                .serialize(record)
                .with_context(|| format!("Failed to write record to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }

    /// Load records back from a headed CSV
    pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: T = result
                .with_context(|| format!("Failed to deserialize record from {}", path.display()))?;
            records.push(record);
        }
        Ok(records)
    }
}
