//! EdgeCast Library
//!
//! Monte Carlo game simulation, self-calibration, arbitrage and value
//! detection, and tiered pick allocation over sportsbook odds

pub mod backtesting;
pub mod calibration;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod odds;
pub mod persistence;
pub mod simulation;
pub mod tiering;
pub mod types;

pub use calibration::{CalibrationSnapshot, CalibrationState, CalibrationStore};
pub use config::AppConfig;
pub use engine::{BatchManifest, BatchReport, PredictionEngine};
pub use error::{EngineError, Result};
pub use types::*;
