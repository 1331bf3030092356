//! Odds normalizer
//!
//! Converts American odds into implied probabilities and decimal multipliers.
//! Every other component prices through these functions.

pub mod book;

pub use book::{line_key, QuoteBook, QuoteRejection};

use crate::error::{EngineError, Result};

/// Break-even probability of an American price, ignoring bookmaker margin.
///
/// `+130` -> 100 / 230, `-150` -> 150 / 250.
pub fn implied_probability(american: i32) -> Result<f64> {
    if american == 0 {
        return Err(EngineError::InvalidOdds { odds: american });
    }
    let o = american as f64;
    if american > 0 {
        Ok(100.0 / (o + 100.0))
    } else {
        let abs = o.abs();
        Ok(abs / (abs + 100.0))
    }
}

/// Total return per unit staked, stake included.
///
/// `+130` -> 2.30, `-150` -> 1.667.
pub fn decimal_multiplier(american: i32) -> Result<f64> {
    if american == 0 {
        return Err(EngineError::InvalidOdds { odds: american });
    }
    let o = american as f64;
    if american > 0 {
        Ok(1.0 + o / 100.0)
    } else {
        Ok(1.0 + 100.0 / o.abs())
    }
}

/// Gross payout (stake included) of a winning bet
pub fn payout(stake: f64, american: i32) -> Result<f64> {
    Ok(stake * decimal_multiplier(american)?)
}

/// Expected value per unit staked at a given win probability
pub fn expected_value(probability: f64, american: i32) -> Result<f64> {
    let p = probability.clamp(0.0, 1.0);
    let net_win = decimal_multiplier(american)? - 1.0;
    Ok(p * net_win - (1.0 - p))
}

/// Fair American price for a probability in (0, 1).
pub fn probability_to_american(probability: f64) -> Result<i32> {
    if !(probability > 0.0 && probability < 1.0) {
        return Err(EngineError::insufficient(
            "probability_to_american",
            format!("probability {probability} outside (0, 1)"),
        ));
    }
    let american = if probability >= 0.5 {
        -(probability / (1.0 - probability)) * 100.0
    } else {
        ((1.0 - probability) / probability) * 100.0
    };
    Ok(american.round() as i32)
}

/// Proportional vig removal for a two-way market.
///
/// Returns the pair unchanged when the sum is not positive.
pub fn remove_vig(p_a: f64, p_b: f64) -> (f64, f64) {
    let sum = p_a + p_b;
    if sum <= 0.0 || !sum.is_finite() {
        return (p_a, p_b);
    }
    (p_a / sum, p_b / sum)
}
