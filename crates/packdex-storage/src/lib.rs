pub mod local_backend;
pub mod memory_backend;

use serde::{Deserialize, Serialize};

use packdex_types::error::{PackdexError, Result};

pub use local_backend::LocalBackend;
pub use memory_backend::MemoryBackend;

/// Object storage used by a repository. Keys are `/`-separated strings.
///
/// Implementations must make `put` atomic: an object is either fully visible
/// to `get`/`list` or absent.
pub trait StorageBackend: Send + Sync {
    /// Read a whole object. `Ok(None)` if it does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Remove an object. Removing a missing object is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// All object keys starting with `prefix`, in no particular order.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read `length` bytes at `offset`. `Ok(None)` if the object does not exist.
    fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Option<Vec<u8>>>;

    /// Object size in bytes. `Ok(None)` if the object does not exist.
    fn size(&self, key: &str) -> Result<Option<u64>>;
}

/// Backend selection, embedded in the repository section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Plain path, `file://` URL, or `memory://`.
    pub url: String,
}

/// Build a storage backend from its configuration.
pub fn backend_from_config(cfg: &StorageConfig) -> Result<Box<dyn StorageBackend>> {
    let url = cfg.url.trim();
    if url == "memory://" {
        return Ok(Box::new(MemoryBackend::new()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Box::new(LocalBackend::new(path)?));
    }
    if url.is_empty() || url.contains("://") {
        return Err(PackdexError::UnsupportedBackend(url.to_string()));
    }
    Ok(Box::new(LocalBackend::new(url)?))
}
