use crate::{
    errors::{ErrorKind, Fallible},
    types::Balance,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound of every single ledger or registry call.
    pub call_timeout_ms: u64,
    /// Credited to the owner's key before a uniqueness claim. Zero disables funding.
    pub fee_allowance: Balance,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            fee_allowance: 0,
        }
    }
}

impl CoordinatorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Reads a JSON configuration. Missing fields take their default values.
pub fn load_config(path: &Path) -> Fallible<CoordinatorConfig> {
    let data = std::fs::read(path).map_err(|error| ErrorKind::ConfigReadError {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;

    let config = serde_json::from_slice(&data).map_err(|error| {
        ErrorKind::ConfigSerializationError {
            path: path.display().to_string(),
            reason: error.to_string(),
        }
    })?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &CoordinatorConfig) -> Fallible<()> {
    let serialization_error = |reason: String| ErrorKind::ConfigSerializationError {
        path: path.display().to_string(),
        reason,
    };
    let data = serde_json::to_string_pretty(config)
        .map_err(|error| serialization_error(error.to_string()))?;
    std::fs::write(path, data).map_err(|error| serialization_error(error.to_string()))?;
    Ok(())
}
