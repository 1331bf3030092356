//! Cross-bookmaker arbitrage scan
//!
//! Best price per mutually exclusive side, per market and line. A sum of
//! implied probabilities under one is an opportunity; stakes are split so
//! every leg pays the same.

use chrono::Duration;
use tracing::{debug, info};

use crate::config::ArbitrageConfig;
use crate::error::Result;
use crate::odds::{line_key, QuoteBook};
use crate::types::{
    ArbitrageLeg, ArbitrageOpportunity, GameContext, MarketType, OddsQuote,
};

/// Split `total_stake` across legs proportionally to implied probability.
///
/// Returns the legs and the implied-probability sum.
pub fn split_stakes(quotes: &[&OddsQuote], total_stake: f64) -> Result<(Vec<ArbitrageLeg>, f64)> {
    let mut probs = Vec::with_capacity(quotes.len());
    for q in quotes {
        probs.push(q.implied_probability()?);
    }
    let sum: f64 = probs.iter().sum();

    let mut legs = Vec::with_capacity(quotes.len());
    for (q, p) in quotes.iter().zip(&probs) {
        let stake = total_stake * p / sum;
        legs.push(ArbitrageLeg {
            bookmaker: q.bookmaker.clone(),
            side: q.side,
            american_odds: q.american_odds,
            line: q.line,
            implied_probability: *p,
            stake,
            payout: stake * q.decimal_multiplier()?,
            captured_at: q.captured_at,
        });
    }
    Ok((legs, sum))
}

#[derive(Debug, Clone)]
pub struct ArbitrageScanner {
    config: ArbitrageConfig,
}

impl ArbitrageScanner {
    pub fn new(config: ArbitrageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArbitrageConfig {
        &self.config
    }

    /// Validate and scan raw quotes for one game
    pub fn scan_quotes(&self, game: &GameContext, quotes: &[OddsQuote]) -> Vec<ArbitrageOpportunity> {
        let (book, _) = QuoteBook::build(game, quotes, self.config.max_quote_skew_secs);
        self.scan(&book)
    }

    /// Every market of the book, each scanned independently
    pub fn scan(&self, book: &QuoteBook<'_>) -> Vec<ArbitrageOpportunity> {
        MarketType::ALL
            .iter()
            .flat_map(|market| self.scan_market(book, *market))
            .collect()
    }

    /// One market; spreads and totals are grouped by line
    pub fn scan_market(&self, book: &QuoteBook<'_>, market: MarketType) -> Vec<ArbitrageOpportunity> {
        let groups: Vec<Option<Option<i64>>> = match market {
            MarketType::Moneyline => vec![None],
            MarketType::Spread | MarketType::Total => book
                .line_keys(market)
                .into_iter()
                .filter(|k| k.is_some())
                .map(Some)
                .collect(),
        };

        groups
            .into_iter()
            .filter_map(|key| self.scan_group(book, market, key))
            .collect()
    }

    fn scan_group(
        &self,
        book: &QuoteBook<'_>,
        market: MarketType,
        key: Option<Option<i64>>,
    ) -> Option<ArbitrageOpportunity> {
        let game = book.game();
        let [a, b] = market.sides();
        let best = [
            book.best_price(market, a, key)?,
            book.best_price(market, b, key)?,
        ];
        if let Some(k) = key {
            debug_assert!(best.iter().all(|q| line_key(q) == k));
        }

        // Same refresh cycle guard
        let newest = best.iter().map(|q| q.captured_at).max()?;
        let oldest = best.iter().map(|q| q.captured_at).min()?;
        if newest - oldest > Duration::seconds(self.config.max_quote_skew_secs) {
            debug!(game = %game.key(), %market, "Legs from different refresh cycles, skipping");
            return None;
        }

        let (legs, implied_sum) = match split_stakes(&best, self.config.reference_stake) {
            Ok(split) => split,
            Err(e) => {
                debug!(game = %game.key(), error = %e, "Unpriceable arbitrage legs");
                return None;
            }
        };

        if implied_sum >= 1.0 {
            return None;
        }
        let profit_pct = (1.0 / implied_sum - 1.0) * 100.0;
        if implied_sum >= 1.0 - self.config.min_profit_pct / 100.0 {
            info!(
                game = %game.key(),
                %market,
                implied_sum,
                profit_pct,
                floor = self.config.min_profit_pct,
                "Arbitrage below profit floor"
            );
            return None;
        }

        let total_stake: f64 = legs.iter().map(|l| l.stake).sum();
        let payout = self.config.reference_stake / implied_sum;
        let cycle_at = book.cycle_at(market).unwrap_or(newest);

        info!(
            game = %game.key(),
            %market,
            profit_pct,
            legs = ?legs.iter().map(|l| format!("{}@{} {}", l.side, l.bookmaker, l.american_odds)).collect::<Vec<_>>(),
            "💰 Arbitrage found"
        );

        Some(ArbitrageOpportunity {
            game: game.key(),
            sport: game.sport,
            market,
            legs,
            implied_sum,
            profit_pct,
            total_stake,
            guaranteed_profit: payout - total_stake,
            cycle_at,
        })
    }
}
