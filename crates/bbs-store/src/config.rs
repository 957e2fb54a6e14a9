use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// How resource locks are enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// In-process lock table only. Correct when one process owns the data root.
    #[default]
    InProcess,
    /// Lock table plus an OS advisory lock on `.locks/<name>.lock`, for
    /// several processes sharing one data root.
    MultiProcess,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_root: PathBuf,
    pub lock_mode: LockMode,
    /// `fsync` each temp file before it is renamed into place.
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            lock_mode: LockMode::InProcess,
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// Default settings rooted at `data_root`.
    pub fn at(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        toml::from_str(raw).map_err(|e| StoreError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }
}
