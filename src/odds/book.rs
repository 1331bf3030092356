//! Per-game quote book
//!
//! Validates raw quotes, keeps only the current refresh cycle of each market
//! and answers best-price / consensus questions for the simulator and the
//! detectors.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::types::{GameContext, GameKey, MarketType, OddsQuote, Side};

/// A quote that was rejected before any pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRejection {
    pub game: GameKey,
    pub bookmaker: String,
    pub market: MarketType,
    pub side: Side,
    pub american_odds: i32,
    pub reason: String,
    pub kind: String,
}

impl QuoteRejection {
    fn new(game: GameKey, quote: &OddsQuote, error: &EngineError) -> Self {
        Self {
            game,
            bookmaker: quote.bookmaker.clone(),
            market: quote.market,
            side: quote.side,
            american_odds: quote.american_odds,
            reason: error.to_string(),
            kind: error.kind().to_string(),
        }
    }
}

/// Line expressed from the home/over perspective, in tenths of a point.
///
/// A home spread of -3.5 and an away spread of +3.5 share the key -35.
pub fn line_key(quote: &OddsQuote) -> Option<i64> {
    let line = quote.line?;
    let home_view = match (quote.market, quote.side) {
        (MarketType::Spread, Side::Away) => -line,
        _ => line,
    };
    Some((home_view * 10.0).round() as i64)
}

/// Current-cycle quotes of one game, indexed by market
#[derive(Debug, Clone)]
pub struct QuoteBook<'a> {
    game: &'a GameContext,
    by_market: HashMap<MarketType, Vec<&'a OddsQuote>>,
    cycle_at: HashMap<MarketType, DateTime<Utc>>,
    stale_dropped: usize,
}

impl<'a> QuoteBook<'a> {
    /// Build the book. Invalid quotes are returned as rejections and never priced.
    pub fn build(
        game: &'a GameContext,
        quotes: &'a [OddsQuote],
        max_quote_skew_secs: i64,
    ) -> (Self, Vec<QuoteRejection>) {
        let key = game.key();
        let mut rejections = Vec::new();
        let mut valid: HashMap<MarketType, Vec<&'a OddsQuote>> = HashMap::new();

        for quote in quotes {
            match quote.validate() {
                Ok(()) => valid.entry(quote.market).or_default().push(quote),
                Err(e) => {
                    warn!(game = %key, bookmaker = %quote.bookmaker, error = %e, "Rejected quote");
                    rejections.push(QuoteRejection::new(key.clone(), quote, &e));
                }
            }
        }

        let skew = Duration::seconds(max_quote_skew_secs.max(0));
        let mut by_market = HashMap::new();
        let mut cycle_at = HashMap::new();
        let mut stale_dropped = 0usize;

        for (market, mut market_quotes) in valid {
            let Some(newest) = market_quotes.iter().map(|q| q.captured_at).max() else {
                continue;
            };
            let before = market_quotes.len();
            market_quotes.retain(|q| newest - q.captured_at <= skew);
            let dropped = before - market_quotes.len();
            if dropped > 0 {
                debug!(game = %key, %market, dropped, "Dropped quotes from an older refresh cycle");
                stale_dropped += dropped;
            }

            // One quote per (bookmaker, side, line): the most recent one
            market_quotes.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
            let mut seen = std::collections::HashSet::new();
            market_quotes.retain(|q| seen.insert((q.bookmaker.clone(), q.side, line_key(q))));

            cycle_at.insert(market, newest);
            by_market.insert(market, market_quotes);
        }

        (
            Self {
                game,
                by_market,
                cycle_at,
                stale_dropped,
            },
            rejections,
        )
    }

    pub fn game(&self) -> &GameContext {
        self.game
    }

    pub fn quotes(&self, market: MarketType) -> &[&'a OddsQuote] {
        self.by_market
            .get(&market)
            .map(|q| q.as_slice())
            .unwrap_or(&[])
    }

    /// Newest capture time of a market's refresh cycle
    pub fn cycle_at(&self, market: MarketType) -> Option<DateTime<Utc>> {
        self.cycle_at.get(&market).copied()
    }

    pub fn stale_dropped(&self) -> usize {
        self.stale_dropped
    }

    pub fn is_empty(&self) -> bool {
        self.by_market.values().all(|q| q.is_empty())
    }

    /// Distinct home/over line keys quoted for a market
    pub fn line_keys(&self, market: MarketType) -> Vec<Option<i64>> {
        let mut keys: Vec<Option<i64>> = self.quotes(market).iter().map(|q| line_key(q)).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Highest-paying quote for a side, optionally restricted to one line key
    pub fn best_price(
        &self,
        market: MarketType,
        side: Side,
        key: Option<Option<i64>>,
    ) -> Option<&'a OddsQuote> {
        self.quotes(market)
            .iter()
            .copied()
            .filter(|q| q.side == side)
            .filter(|q| key.map_or(true, |k| line_key(q) == k))
            .fold(None, |best: Option<&'a OddsQuote>, q| match best {
                Some(b) if b.american_odds >= q.american_odds => Some(b),
                _ => Some(q),
            })
    }

    /// Mean implied probability of a side across bookmakers
    pub fn consensus_implied(&self, market: MarketType, side: Side) -> Option<f64> {
        let probs: Vec<f64> = self
            .quotes(market)
            .iter()
            .filter(|q| q.side == side)
            .filter_map(|q| q.implied_probability().ok())
            .collect();
        if probs.is_empty() {
            return None;
        }
        Some(probs.iter().sum::<f64>() / probs.len() as f64)
    }

    /// Median line from the home/over perspective
    pub fn consensus_line(&self, market: MarketType) -> Option<f64> {
        let mut lines: Vec<f64> = self
            .quotes(market)
            .iter()
            .filter_map(|q| line_key(q))
            .map(|k| k as f64 / 10.0)
            .collect();
        if lines.is_empty() {
            return None;
        }
        lines.sort_by(|a, b| a.total_cmp(b));
        Some(lines[lines.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sport;
    use chrono::TimeZone;

    fn game() -> GameContext {
        GameContext {
            id: Some("G1".to_string()),
            home: "HOME".to_string(),
            away: "AWAY".to_string(),
            sport: Sport::Nba,
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            venue: None,
        }
    }

    fn quote(book: &str, market: MarketType, side: Side, odds: i32, line: Option<f64>, secs: i64) -> OddsQuote {
        OddsQuote {
            bookmaker: book.to_string(),
            market,
            side,
            american_odds: odds,
            line,
            captured_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() - Duration::seconds(secs),
        }
    }

    #[test]
    fn test_invalid_quotes_rejected_without_aborting() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, 0, None, 0),
            quote("A", MarketType::Moneyline, Side::Away, 120, None, 0),
        ];
        let (book, rejections) = QuoteBook::build(&g, &quotes, 60);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].kind, "INVALID_ODDS");
        assert_eq!(book.quotes(MarketType::Moneyline).len(), 1);
    }

    #[test]
    fn test_stale_cycle_dropped() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -150, None, 0),
            quote("B", MarketType::Moneyline, Side::Away, 400, None, 600),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        assert_eq!(book.stale_dropped(), 1);
        assert!(book.best_price(MarketType::Moneyline, Side::Away, None).is_none());
    }

    #[test]
    fn test_latest_quote_per_bookmaker_wins() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -150, None, 30),
            quote("A", MarketType::Moneyline, Side::Home, -140, None, 0),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        let best = book.best_price(MarketType::Moneyline, Side::Home, None).unwrap();
        assert_eq!(best.american_odds, -140);
        assert_eq!(book.quotes(MarketType::Moneyline).len(), 1);
    }

    #[test]
    fn test_spread_line_keys_pair_opposite_sides() {
        let home = quote("A", MarketType::Spread, Side::Home, -110, Some(-3.5), 0);
        let away = quote("B", MarketType::Spread, Side::Away, -105, Some(3.5), 0);
        assert_eq!(line_key(&home), line_key(&away));
        assert_eq!(line_key(&home), Some(-35));
    }

    #[test]
    fn test_consensus_values() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -150, None, 0),
            quote("B", MarketType::Moneyline, Side::Home, 100, None, 0),
            quote("A", MarketType::Total, Side::Over, -110, Some(220.5), 0),
            quote("B", MarketType::Total, Side::Over, -110, Some(221.5), 0),
            quote("C", MarketType::Total, Side::Under, -110, Some(221.5), 0),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        let p = book.consensus_implied(MarketType::Moneyline, Side::Home).unwrap();
        assert!((p - 0.55).abs() < 1e-9);
        assert_eq!(book.consensus_line(MarketType::Total), Some(221.5));
        assert!(book.consensus_implied(MarketType::Moneyline, Side::Away).is_none());
    }
}
