//! Confidence derivation
//!
//! raw = round(max(p_home, p_away) * 100), home boost / away penalty, market
//! ceiling, then the global band.

use serde::{Deserialize, Serialize};

use crate::config::{ConfidenceConfig, SportProfile};
use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceOutcome {
    pub side: Side,
    pub raw: f64,
    pub confidence: f64,
}

/// Clamp to the market ceiling, then to the global band
pub fn clamp_confidence(
    adjusted: f64,
    market_implied: f64,
    ceiling_margin: f64,
    band: &ConfidenceConfig,
) -> f64 {
    let market_ceiling = market_implied.clamp(0.0, 1.0) * 100.0 + ceiling_margin;
    adjusted.min(market_ceiling).clamp(band.floor, band.ceiling)
}

/// Moneyline confidence for the side the simulation favours.
///
/// `market_home` / `market_away` are the market implied probabilities of each side.
#[allow(clippy::too_many_arguments)]
pub fn moneyline_confidence(
    home_win_probability: f64,
    away_win_probability: f64,
    expected_home: f64,
    expected_away: f64,
    market_home: f64,
    market_away: f64,
    profile: &SportProfile,
    band: &ConfidenceConfig,
) -> ConfidenceOutcome {
    let side = if home_win_probability >= away_win_probability {
        Side::Home
    } else {
        Side::Away
    };
    let raw = (home_win_probability.max(away_win_probability) * 100.0).round();

    let adjusted = match side {
        Side::Home if expected_home > expected_away => raw + profile.home_bias_boost,
        Side::Away => raw - profile.away_penalty,
        _ => raw,
    };
    let market = if side == Side::Home {
        market_home
    } else {
        market_away
    };

    ConfidenceOutcome {
        side,
        raw,
        confidence: clamp_confidence(adjusted, market, profile.market_ceiling_margin, band),
    }
}

/// Spread/total confidence: no home-field adjustment
pub fn line_confidence(
    probability: f64,
    market_implied: f64,
    ceiling_margin: f64,
    band: &ConfidenceConfig,
) -> f64 {
    let raw = (probability.clamp(0.0, 1.0) * 100.0).round();
    clamp_confidence(raw, market_implied, ceiling_margin, band)
}
