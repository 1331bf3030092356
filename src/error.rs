//! Engine error taxonomy
//!
//! Scan results that find nothing (no arbitrage, no value) are empty
//! collections, not errors.

use thiserror::Error;

use crate::types::Sport;

/// Errors raised by the numeric core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Zero or malformed American odds. Rejects the single quote only.
    #[error("invalid american odds: {odds}")]
    InvalidOdds { odds: i32 },

    /// A game or recompute lacks the inputs it needs and is skipped.
    #[error("insufficient data for {context}: {reason}")]
    InsufficientData { context: String, reason: String },

    /// Too few resolved games to move the calibration state.
    #[error("calibration underflow for {sport}: {samples} samples < {required} required")]
    CalibrationUnderflow {
        sport: Sport,
        samples: usize,
        required: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn insufficient(context: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InsufficientData {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag used in manifests and CSV reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidOdds { .. } => "INVALID_ODDS",
            EngineError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            EngineError::CalibrationUnderflow { .. } => "CALIBRATION_UNDERFLOW",
            EngineError::InvalidConfig(_) => "INVALID_CONFIG",
            EngineError::Persistence(_) => "PERSISTENCE",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::InvalidOdds { odds: 0 };
        assert_eq!(err.to_string(), "invalid american odds: 0");
        assert_eq!(err.kind(), "INVALID_ODDS");

        let err = EngineError::CalibrationUnderflow {
            sport: Sport::Nba,
            samples: 4,
            required: 20,
        };
        assert!(err.to_string().contains("NBA"));
        assert!(err.to_string().contains("4 samples < 20"));
    }
}
