use serde::{Deserialize, Serialize};

use crate::config::ValueConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyQuote {
    /// Model win probability, 0-1
    pub p_model: f64,
    /// Market implied probability, 0-1
    pub p_market: f64,
    pub f_raw: f64,
    /// Kelly multiplier actually applied
    pub fraction: f64,
    pub f_fractional: f64,
    /// Units after clamping to [min_stake, max_stake]
    pub stake: f64,
}

/// Fractional Kelly: `(c/100 - p) / (1 - p)` scaled by the configured fraction.
///
/// Edges at or above `large_edge_threshold` use the smaller fraction.
pub fn compute_fractional_kelly(confidence: f64, market_implied: f64, config: &ValueConfig) -> KellyQuote {
    let p_model = (confidence / 100.0).clamp(0.0, 1.0);
    let p_market = market_implied.clamp(0.0, 1.0);
    let edge = (p_model - p_market) * 100.0;

    let f_raw = if p_market < 1.0 {
        (p_model - p_market) / (1.0 - p_market)
    } else {
        0.0
    };
    let fraction = if edge >= config.large_edge_threshold {
        config.large_edge_kelly_fraction
    } else {
        config.kelly_fraction
    };
    let f_fractional = f_raw.max(0.0) * fraction;
    let stake = (f_fractional * config.bankroll_unit).clamp(config.min_stake, config.max_stake);

    KellyQuote {
        p_model,
        p_market,
        f_raw,
        fraction,
        f_fractional,
        stake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kelly_zero_when_negative_edge() {
        let q = compute_fractional_kelly(45.0, 0.50, &ValueConfig::default());
        assert!(q.f_fractional <= 0.0000001);
        assert!(q.f_raw < 0.0);
    }

    #[test]
    fn kelly_small_stake_clamped_to_minimum() {
        // (0.78 - 0.65) / 0.35 = 0.371, quarter Kelly of 100 units = 9.29
        let q = compute_fractional_kelly(78.0, 0.65, &ValueConfig::default());
        assert!((q.f_raw - 0.13 / 0.35).abs() < 1e-9);
        assert_eq!(q.fraction, 0.25);
        assert_eq!(q.stake, 10.0);
    }

    #[test]
    fn kelly_large_edge_uses_smaller_fraction() {
        let config = ValueConfig::default();
        let q = compute_fractional_kelly(90.0, 0.40, &config);
        assert_eq!(q.fraction, config.large_edge_kelly_fraction);
        // 0.8333 * 0.125 * 100 = 10.4
        assert!((q.stake - 10.416666).abs() < 1e-4);
    }

    #[test]
    fn kelly_stake_capped() {
        let config = ValueConfig {
            bankroll_unit: 1000.0,
            ..ValueConfig::default()
        };
        let q = compute_fractional_kelly(70.0, 0.55, &config);
        assert_eq!(q.stake, config.max_stake);
    }

    #[test]
    fn kelly_never_full_by_default() {
        let config = ValueConfig::default();
        for c in [55.0, 70.0, 85.0, 95.0] {
            let q = compute_fractional_kelly(c, 0.5, &config);
            assert!(q.f_fractional < q.f_raw);
        }
    }
}
