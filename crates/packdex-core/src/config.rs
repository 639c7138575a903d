use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PackdexError, Result};
use crate::storage::StorageConfig;

/// Upper bound for the worker pools used by rebuild and load.
pub const MAX_INDEX_THREADS: usize = 256;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackdexConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Plain path, `file://` URL, or `memory://`.
    #[serde(default)]
    pub url: String,
}

impl RepositoryConfig {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            url: self.url.clone(),
        }
    }
}

/// How `Index::load` treats a pack that two snapshots describe differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// Fail the load.
    #[default]
    Strict,
    /// Drop the pack from the index, remember it as untrusted, and continue.
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Worker threads for reading pack headers during a rebuild
    /// (0 = all cores, 1 = sequential).
    #[serde(default)]
    pub rebuild_threads: usize,
    /// Worker threads for fetching and decoding index snapshots
    /// (0 = all cores, 1 = sequential).
    #[serde(default)]
    pub load_threads: usize,
    #[serde(default)]
    pub consistency: ConsistencyMode,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("index.rebuild_threads", self.rebuild_threads),
            ("index.load_threads", self.load_threads),
        ] {
            if value > MAX_INDEX_THREADS {
                return Err(PackdexError::Config(format!(
                    "{name} must be at most {MAX_INDEX_THREADS}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl PackdexConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: PackdexConfig = serde_yaml::from_str(raw)
            .map_err(|e| PackdexError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PackdexError::Config(format!("unable to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repository.url.trim().is_empty() {
            return Err(PackdexError::Config("repository.url must be set".into()));
        }
        self.index.validate()
    }
}
