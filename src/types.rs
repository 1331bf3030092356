//! Core types used throughout EdgeCast
//!
//! Defines odds quotes, game contexts, picks, arbitrage opportunities and
//! historical results shared by the simulator, detectors and allocator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::odds;

/// Quotes with an absolute American value above this are treated as feed noise.
pub const MAX_ABS_AMERICAN_ODDS: i32 = 10_000;

/// Supported sports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nfl,
    Ncaaf,
    Nba,
    Ncaab,
    Nhl,
    Mlb,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Nfl,
        Sport::Ncaaf,
        Sport::Nba,
        Sport::Ncaab,
        Sport::Nhl,
        Sport::Mlb,
    ];

    /// Stable lowercase key used for config maps and file names
    pub fn key(&self) -> &'static str {
        match self {
            Sport::Nfl => "nfl",
            Sport::Ncaaf => "ncaaf",
            Sport::Nba => "nba",
            Sport::Ncaab => "ncaab",
            Sport::Nhl => "nhl",
            Sport::Mlb => "mlb",
        }
    }

    /// Parse from string, accepting common league aliases
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NFL" | "AMERICANFOOTBALL_NFL" => Some(Sport::Nfl),
            "NCAAF" | "CFB" | "COLLEGE FOOTBALL" | "AMERICANFOOTBALL_NCAAF" => Some(Sport::Ncaaf),
            "NBA" | "BASKETBALL_NBA" => Some(Sport::Nba),
            "NCAAB" | "CBB" | "COLLEGE BASKETBALL" | "BASKETBALL_NCAAB" => Some(Sport::Ncaab),
            "NHL" | "ICEHOCKEY_NHL" => Some(Sport::Nhl),
            "MLB" | "BASEBALL_MLB" => Some(Sport::Mlb),
            _ => None,
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key().to_uppercase())
    }
}

/// Betting market type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
}

impl MarketType {
    pub const ALL: [MarketType; 3] = [MarketType::Moneyline, MarketType::Spread, MarketType::Total];

    /// The two mutually exclusive outcomes of this market
    pub fn sides(&self) -> [Side; 2] {
        match self {
            MarketType::Moneyline | MarketType::Spread => [Side::Home, Side::Away],
            MarketType::Total => [Side::Over, Side::Under],
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Moneyline => write!(f, "moneyline"),
            MarketType::Spread => write!(f, "spread"),
            MarketType::Total => write!(f, "total"),
        }
    }
}

/// Outcome side within a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "HOME"),
            Side::Away => write!(f, "AWAY"),
            Side::Over => write!(f, "OVER"),
            Side::Under => write!(f, "UNDER"),
        }
    }
}

/// Single bookmaker quote, immutable snapshot of one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub bookmaker: String,
    pub market: MarketType,
    pub side: Side,
    pub american_odds: i32,
    /// Spread points (home/away perspective) or total points
    #[serde(default)]
    pub line: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl OddsQuote {
    /// Reject zero, sub-100 and absurd American prices.
    pub fn validate(&self) -> Result<()> {
        let o = self.american_odds;
        if o == 0 || o.abs() < 100 || o.abs() > MAX_ABS_AMERICAN_ODDS {
            return Err(EngineError::InvalidOdds { odds: o });
        }
        if !self.market.sides().contains(&self.side) {
            return Err(EngineError::insufficient(
                format!("{} quote from {}", self.market, self.bookmaker),
                format!("side {} does not belong to market", self.side),
            ));
        }
        Ok(())
    }

    pub fn implied_probability(&self) -> Result<f64> {
        odds::implied_probability(self.american_odds)
    }

    pub fn decimal_multiplier(&self) -> Result<f64> {
        odds::decimal_multiplier(self.american_odds)
    }
}

/// Game identity: canonical id, or (home, away, date) when none is supplied
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameKey(pub String);

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduled game between two competitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContext {
    #[serde(default)]
    pub id: Option<String>,
    pub home: String,
    pub away: String,
    pub sport: Sport,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub venue: Option<String>,
}

impl GameContext {
    pub fn key(&self) -> GameKey {
        match &self.id {
            Some(id) => GameKey(id.clone()),
            None => GameKey(format!(
                "{}:{}@{}:{}",
                self.sport.key(),
                self.away,
                self.home,
                self.start_time.format("%Y-%m-%d")
            )),
        }
    }
}

/// A game plus every quote observed for it in the current cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOdds {
    pub game: GameContext,
    pub quotes: Vec<OddsQuote>,
}

/// Pick quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Elite,
    Pro,
    Free,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Elite => write!(f, "ELITE"),
            Tier::Pro => write!(f, "PRO"),
            Tier::Free => write!(f, "FREE"),
        }
    }
}

/// Qualitative strength of a value edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueLabel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ValueLabel {
    /// Edge in percentage points
    pub fn from_edge(edge: f64) -> Self {
        if edge >= 10.0 {
            ValueLabel::VeryHigh
        } else if edge >= 7.0 {
            ValueLabel::High
        } else if edge >= 5.0 {
            ValueLabel::Medium
        } else {
            ValueLabel::Low
        }
    }
}

impl fmt::Display for ValueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueLabel::Low => write!(f, "low"),
            ValueLabel::Medium => write!(f, "medium"),
            ValueLabel::High => write!(f, "high"),
            ValueLabel::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// A value pick emitted by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub id: Uuid,
    pub game: GameKey,
    pub sport: Sport,
    pub market: MarketType,
    pub side: Side,
    pub line: Option<f64>,
    pub bookmaker: String,
    pub american_odds: i32,
    /// Model confidence, 0-100
    pub confidence: f64,
    /// Market implied probability of the picked side, 0-1
    pub market_implied_probability: f64,
    /// Percentage points of confidence over the market
    pub edge: f64,
    /// Expected value per unit staked
    pub expected_value: f64,
    pub value_label: ValueLabel,
    pub kelly_fraction: f64,
    pub recommended_stake: f64,
    pub factors: Vec<String>,
    pub composite_score: f64,
    pub tier: Option<Tier>,
    pub generated_at: DateTime<Utc>,
}

impl Pick {
    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }
}

/// One leg of an arbitrage stake split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageLeg {
    pub bookmaker: String,
    pub side: Side,
    pub american_odds: i32,
    pub line: Option<f64>,
    pub implied_probability: f64,
    pub stake: f64,
    pub payout: f64,
    pub captured_at: DateTime<Utc>,
}

/// Guaranteed-profit combination across bookmakers, recomputed every scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub game: GameKey,
    pub sport: Sport,
    pub market: MarketType,
    pub legs: Vec<ArbitrageLeg>,
    pub implied_sum: f64,
    pub profit_pct: f64,
    pub total_stake: f64,
    pub guaranteed_profit: f64,
    /// Newest capture time among the quotes of the refresh cycle
    pub cycle_at: DateTime<Utc>,
}

/// Final game outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    HomeWin,
    AwayWin,
    Draw,
}

/// Final score of a completed game. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResult {
    pub game: GameKey,
    pub sport: Sport,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default)]
    pub closing_home_odds: Option<i32>,
    #[serde(default)]
    pub closing_away_odds: Option<i32>,
    pub resolved_at: DateTime<Utc>,
}

impl HistoricalResult {
    pub fn outcome(&self) -> GameOutcome {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => GameOutcome::HomeWin,
            std::cmp::Ordering::Less => GameOutcome::AwayWin,
            std::cmp::Ordering::Equal => GameOutcome::Draw,
        }
    }

    pub fn winner(&self) -> Option<Side> {
        match self.outcome() {
            GameOutcome::HomeWin => Some(Side::Home),
            GameOutcome::AwayWin => Some(Side::Away),
            GameOutcome::Draw => None,
        }
    }

    /// Home score minus away score
    pub fn margin(&self) -> f64 {
        self.home_score as f64 - self.away_score as f64
    }

    pub fn total(&self) -> f64 {
        self.home_score as f64 + self.away_score as f64
    }
}
