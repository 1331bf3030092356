//! Calibration persistence
//!
//! One small record per (sport, model version), last write wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use super::CalibrationState;
use crate::error::{EngineError, Result};
use crate::types::Sport;

/// Get/set storage for calibration state
#[cfg_attr(test, automock)]
pub trait CalibrationRepository: Send + Sync {
    fn load(&self, sport: Sport, model_version: &str) -> Result<Option<CalibrationState>>;
    fn save(&self, state: &CalibrationState) -> Result<()>;
}

/// Process-local repository
#[derive(Debug, Default)]
pub struct InMemoryCalibrationRepository {
    states: RwLock<HashMap<(Sport, String), CalibrationState>>,
}

impl InMemoryCalibrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationRepository for InMemoryCalibrationRepository {
    fn load(&self, sport: Sport, model_version: &str) -> Result<Option<CalibrationState>> {
        let states = self
            .states
            .read()
            .map_err(|_| EngineError::Persistence("calibration lock poisoned".to_string()))?;
        Ok(states.get(&(sport, model_version.to_string())).cloned())
    }

    fn save(&self, state: &CalibrationState) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| EngineError::Persistence("calibration lock poisoned".to_string()))?;
        states.insert((state.sport, state.model_version.clone()), state.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per sport and model version
#[derive(Debug, Clone)]
pub struct JsonFileCalibrationRepository {
    dir: PathBuf,
}

impl JsonFileCalibrationRepository {
    /// Repository rooted at `<data_dir>/calibration`
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().join("calibration");
        fs::create_dir_all(&dir).map_err(|e| {
            EngineError::Persistence(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, sport: Sport, model_version: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", sport.key(), model_version))
    }
}

impl CalibrationRepository for JsonFileCalibrationRepository {
    fn load(&self, sport: Sport, model_version: &str) -> Result<Option<CalibrationState>> {
        let path = self.path_for(sport, model_version);
        if !path.exists() {
            debug!(path = %path.display(), "No calibration file yet");
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|e| {
            EngineError::Persistence(format!("cannot read {}: {e}", path.display()))
        })?;
        let state: CalibrationState = serde_json::from_str(&json).map_err(|e| {
            EngineError::Persistence(format!("corrupt calibration {}: {e}", path.display()))
        })?;
        Ok(Some(state))
    }

    fn save(&self, state: &CalibrationState) -> Result<()> {
        let path = self.path_for(state.sport, &state.model_version);
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;
        // write-then-rename
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| {
            EngineError::Persistence(format!("cannot write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            EngineError::Persistence(format!("cannot replace {}: {e}", path.display()))
        })?;
        info!(
            "💾 Calibration saved to {} (v{})",
            path.display(),
            state.version
        );
        Ok(())
    }
}
