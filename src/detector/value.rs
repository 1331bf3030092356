//! Value-bet scan
//!
//! A side is value when model confidence beats its market implied probability
//! by at least `edge_threshold` points.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::kelly::{compute_fractional_kelly, KellyQuote};
use crate::config::{ConfidenceConfig, SportProfile, ValueConfig};
use crate::odds::{self, QuoteBook};
use crate::simulation::{line_confidence, Prediction};
use crate::types::{MarketType, OddsQuote, Pick, Side, ValueLabel};

pub const FACTOR_EDGE: &str = "edge";
pub const FACTOR_POSITIVE_EV: &str = "positive_ev";
pub const FACTOR_HOME_SIDE: &str = "home_side";
pub const FACTOR_SIMULATION_AGREES: &str = "simulation_agrees";
pub const FACTOR_HIGH_CONFIDENCE: &str = "high_confidence";
pub const FACTOR_BEST_PRICE: &str = "best_price";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeQuote {
    pub confidence: f64,
    pub p_market: f64,
    /// Points of confidence over the market
    pub edge: f64,
    pub meets_threshold: bool,
    pub kelly: KellyQuote,
}

/// Edge and stake for a confidence (0-100) against a market implied probability (0-1)
pub fn evaluate_edge(confidence: f64, market_implied: f64, config: &ValueConfig) -> EdgeQuote {
    let edge = confidence - market_implied * 100.0;
    EdgeQuote {
        confidence,
        p_market: market_implied,
        edge,
        meets_threshold: edge >= config.edge_threshold,
        kelly: compute_fractional_kelly(confidence, market_implied, config),
    }
}

/// Candidate side handed to pick construction
struct Candidate<'q> {
    market: MarketType,
    side: Side,
    quote: &'q OddsQuote,
    confidence: f64,
    /// Simulated probability of the side, before confidence clamping
    simulated: f64,
}

#[derive(Debug, Clone)]
pub struct ValueDetector {
    config: ValueConfig,
    confidence: ConfidenceConfig,
}

impl ValueDetector {
    pub fn new(config: ValueConfig, confidence: ConfidenceConfig) -> Self {
        Self { config, confidence }
    }

    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    /// Moneyline, spread and total value picks for one predicted game
    pub fn scan(&self, prediction: &Prediction, book: &QuoteBook<'_>, profile: &SportProfile) -> Vec<Pick> {
        let mut candidates = Vec::new();
        if let Some(c) = self.moneyline_candidate(prediction, book) {
            candidates.push(c);
        }
        for market in [MarketType::Spread, MarketType::Total] {
            if let Some(c) = self.line_candidate(prediction, book, profile, market) {
                candidates.push(c);
            }
        }

        candidates
            .into_iter()
            .filter_map(|c| self.build_pick(prediction, book, c))
            .collect()
    }

    fn moneyline_candidate<'q>(
        &self,
        prediction: &Prediction,
        book: &QuoteBook<'q>,
    ) -> Option<Candidate<'q>> {
        let side = prediction.predicted_side;
        let quote = book.best_price(MarketType::Moneyline, side, None)?;
        Some(Candidate {
            market: MarketType::Moneyline,
            side,
            quote,
            confidence: prediction.confidence,
            simulated: prediction.simulation.win_probability(side)?,
        })
    }

    fn line_candidate<'q>(
        &self,
        prediction: &Prediction,
        book: &QuoteBook<'q>,
        profile: &SportProfile,
        market: MarketType,
    ) -> Option<Candidate<'q>> {
        let split = prediction.simulation.line(market)?;
        let key = Some((split.line * 10.0).round() as i64);

        let [a, b] = market.sides();
        let p_a = split.decided_probability(market, a)?;
        let (side, simulated) = if p_a >= 0.5 { (a, p_a) } else { (b, 1.0 - p_a) };

        let quote = book.best_price(market, side, Some(key))?;
        let implied = quote.implied_probability().ok()?;
        Some(Candidate {
            market,
            side,
            quote,
            confidence: line_confidence(
                simulated,
                implied,
                profile.market_ceiling_margin,
                &self.confidence,
            ),
            simulated,
        })
    }

    fn build_pick(&self, prediction: &Prediction, book: &QuoteBook<'_>, c: Candidate<'_>) -> Option<Pick> {
        let implied = c.quote.implied_probability().ok()?;
        let quote = evaluate_edge(c.confidence, implied, &self.config);
        if !quote.meets_threshold {
            debug!(
                game = %prediction.game,
                market = %c.market,
                side = %c.side,
                edge = quote.edge,
                "No value"
            );
            return None;
        }
        let ev = odds::expected_value(c.confidence / 100.0, c.quote.american_odds).ok()?;

        let mut factors = vec![FACTOR_EDGE.to_string()];
        if ev > 0.0 {
            factors.push(FACTOR_POSITIVE_EV.to_string());
        }
        if c.side == Side::Home {
            factors.push(FACTOR_HOME_SIDE.to_string());
        }
        if c.simulated > implied {
            factors.push(FACTOR_SIMULATION_AGREES.to_string());
        }
        if c.confidence >= self.config.high_confidence {
            factors.push(FACTOR_HIGH_CONFIDENCE.to_string());
        }
        if book
            .consensus_implied(c.market, c.side)
            .map_or(false, |consensus| implied < consensus - 1e-9)
        {
            factors.push(FACTOR_BEST_PRICE.to_string());
        }

        debug!(
            game = %prediction.game,
            market = %c.market,
            side = %c.side,
            edge = quote.edge,
            stake = quote.kelly.stake,
            "Value pick"
        );

        Some(Pick {
            id: Uuid::new_v4(),
            game: prediction.game.clone(),
            sport: prediction.sport,
            market: c.market,
            side: c.side,
            line: c.quote.line,
            bookmaker: c.quote.bookmaker.clone(),
            american_odds: c.quote.american_odds,
            confidence: c.confidence,
            market_implied_probability: implied,
            edge: quote.edge,
            expected_value: ev,
            value_label: ValueLabel::from_edge(quote.edge),
            kelly_fraction: quote.kelly.f_fractional,
            recommended_stake: quote.kelly.stake,
            factors,
            composite_score: 0.0,
            tier: None,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationState;
    use crate::config::SimulationConfig;
    use crate::simulation::{MarketPrior, MonteCarloSimulator};
    use crate::types::{GameContext, Sport};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_edge_scenario() {
        let q = evaluate_edge(78.0, 0.65, &ValueConfig::default());
        assert!((q.edge - 13.0).abs() < 1e-9);
        assert!(q.meets_threshold);
        assert_eq!(q.kelly.stake, 10.0);
    }

    #[test]
    fn test_edge_below_threshold() {
        let q = evaluate_edge(68.0, 0.65, &ValueConfig::default());
        assert!(!q.meets_threshold);
    }

    fn game() -> GameContext {
        GameContext {
            id: Some("G7".to_string()),
            home: "HOME".to_string(),
            away: "AWAY".to_string(),
            sport: Sport::Nba,
            start_time: Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap(),
            venue: None,
        }
    }

    fn quote(book: &str, market: MarketType, side: Side, odds: i32, line: Option<f64>) -> OddsQuote {
        OddsQuote {
            bookmaker: book.to_string(),
            market,
            side,
            american_odds: odds,
            line,
            captured_at: Utc.with_ymd_and_hms(2025, 1, 19, 20, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_scan_emits_underpriced_side() {
        let g = game();
        // Consensus has home as a clear favourite, one book hangs a soft home price
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -300, None),
            quote("A", MarketType::Moneyline, Side::Away, 240, None),
            quote("B", MarketType::Moneyline, Side::Home, -300, None),
            quote("B", MarketType::Moneyline, Side::Away, 240, None),
            quote("C", MarketType::Moneyline, Side::Home, 100, None),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        let prior = MarketPrior::from_book(&book).unwrap();
        let sim = MonteCarloSimulator::new(SimulationConfig::default(), ConfidenceConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let prediction = sim
            .predict(&g, &prior, &CalibrationState::neutral(Sport::Nba, "mc-v1"), &mut rng)
            .unwrap();
        assert_eq!(prediction.predicted_side, Side::Home);

        let detector = ValueDetector::new(ValueConfig::default(), ConfidenceConfig::default());
        let picks = detector.scan(&prediction, &book, &sim.profile(Sport::Nba));
        let pick = picks
            .iter()
            .find(|p| p.market == MarketType::Moneyline)
            .expect("moneyline value pick");

        assert_eq!(pick.bookmaker, "C");
        assert_eq!(pick.side, Side::Home);
        assert!((pick.market_implied_probability - 0.5).abs() < 1e-12);
        assert!(pick.edge >= 5.0);
        assert!(pick.recommended_stake >= 10.0 && pick.recommended_stake <= 50.0);
        assert!(pick.factors.iter().any(|f| f == FACTOR_BEST_PRICE));
        assert!(pick.factors.iter().any(|f| f == FACTOR_HOME_SIDE));
        assert!(pick.tier.is_none());
    }

    fn predict(g: &GameContext, book: &QuoteBook<'_>, sim: &MonteCarloSimulator) -> Prediction {
        let prior = MarketPrior::from_book(book).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        sim.predict(g, &prior, &CalibrationState::neutral(Sport::Nba, "mc-v1"), &mut rng)
            .unwrap()
    }

    fn sharp_simulator() -> MonteCarloSimulator {
        let config = SimulationConfig {
            iterations: 20_000,
            ..SimulationConfig::default()
        };
        MonteCarloSimulator::new(config, ConfidenceConfig::default()).unwrap()
    }

    #[test]
    fn test_scan_emits_soft_spread_and_total_at_consensus_line() {
        let g = game();
        // Even moneyline plus home advantage: home covers -1.5 and the game goes over 200.5
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -110, None),
            quote("A", MarketType::Moneyline, Side::Away, -110, None),
            quote("A", MarketType::Spread, Side::Home, -110, Some(-1.5)),
            quote("A", MarketType::Spread, Side::Away, -110, Some(1.5)),
            quote("B", MarketType::Spread, Side::Home, 150, Some(-1.5)),
            quote("A", MarketType::Total, Side::Over, -110, Some(200.5)),
            quote("A", MarketType::Total, Side::Under, -110, Some(200.5)),
            quote("B", MarketType::Total, Side::Over, 150, Some(200.5)),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        let sim = sharp_simulator();
        let prediction = predict(&g, &book, &sim);

        let detector = ValueDetector::new(ValueConfig::default(), ConfidenceConfig::default());
        let picks = detector.scan(&prediction, &book, &sim.profile(Sport::Nba));

        // +150 is 40% implied, so confidence stops at the 40 + 10 market ceiling
        let check = |market: MarketType, side: Side, line: f64| {
            let pick = picks
                .iter()
                .find(|p| p.market == market)
                .unwrap_or_else(|| panic!("{market} value pick"));
            assert_eq!(pick.side, side);
            assert_eq!(pick.line, Some(line));
            assert_eq!(pick.bookmaker, "B");
            assert_eq!(pick.american_odds, 150);
            assert!((pick.market_implied_probability - 0.4).abs() < 1e-12);
            assert_eq!(pick.confidence, 50.0);
            assert!((pick.edge - 10.0).abs() < 1e-9);
            assert_eq!(pick.value_label, ValueLabel::VeryHigh);
            assert!(pick.factors.iter().any(|f| f == FACTOR_BEST_PRICE));
            assert!(pick.factors.iter().any(|f| f == FACTOR_SIMULATION_AGREES));
        };
        check(MarketType::Spread, Side::Home, -1.5);
        check(MarketType::Total, Side::Over, 200.5);
    }

    #[test]
    fn test_off_consensus_line_ignored() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -110, None),
            quote("A", MarketType::Moneyline, Side::Away, -110, None),
            quote("A", MarketType::Spread, Side::Home, -110, Some(-1.5)),
            quote("A", MarketType::Spread, Side::Away, -110, Some(1.5)),
            quote("D", MarketType::Spread, Side::Home, -110, Some(-1.5)),
            quote("D", MarketType::Spread, Side::Away, -110, Some(1.5)),
            quote("C", MarketType::Spread, Side::Home, 200, Some(-4.5)),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        assert_eq!(book.consensus_line(MarketType::Spread), Some(-1.5));

        let sim = sharp_simulator();
        let prediction = predict(&g, &book, &sim);
        let detector = ValueDetector::new(ValueConfig::default(), ConfidenceConfig::default());
        let picks = detector.scan(&prediction, &book, &sim.profile(Sport::Nba));

        assert!(picks.iter().all(|p| p.market != MarketType::Spread));
        assert!(picks.iter().all(|p| p.bookmaker != "C"));
    }

    #[test]
    fn test_single_price_edge_bounded_by_market_ceiling() {
        let g = game();
        let quotes = vec![
            quote("A", MarketType::Moneyline, Side::Home, -110, None),
            quote("A", MarketType::Moneyline, Side::Away, -110, None),
        ];
        let (book, _) = QuoteBook::build(&g, &quotes, 60);
        let prior = MarketPrior::from_book(&book).unwrap();
        let sim = MonteCarloSimulator::new(SimulationConfig::default(), ConfidenceConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let prediction = sim
            .predict(&g, &prior, &CalibrationState::neutral(Sport::Nba, "mc-v1"), &mut rng)
            .unwrap();

        // With one price per side the edge can never exceed the ceiling margin
        let margin = sim.profile(Sport::Nba).market_ceiling_margin;
        let config = ValueConfig {
            edge_threshold: margin + 1.0,
            ..ValueConfig::default()
        };
        let detector = ValueDetector::new(config, ConfidenceConfig::default());
        assert!(detector.scan(&prediction, &book, &sim.profile(Sport::Nba)).is_empty());
    }
}
