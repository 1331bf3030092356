//! Arbitrage & Value Detector
//!
//! Two scans over the same quote book:
//! - arbitrage: market-neutral, best price per side across bookmakers
//! - value: model confidence against a side's own market implied probability

pub mod arbitrage;
pub mod kelly;
pub mod value;

pub use arbitrage::{split_stakes, ArbitrageScanner};
pub use kelly::{compute_fractional_kelly, KellyQuote};
pub use value::{evaluate_edge, EdgeQuote, ValueDetector};
