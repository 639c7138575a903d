use std::collections::HashMap;
use std::sync::Mutex;

use packdex_types::error::{PackdexError, Result};

use crate::StorageBackend;

/// In-memory storage backend. Thread-safe via Mutex.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .lock()
            .map_err(|_| PackdexError::Storage("memory backend lock poisoned".into()))
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.lock()?;
        Ok(map
            .keys()
            .filter(|k| k.starts_with(prefix) && !k.ends_with('/'))
            .cloned()
            .collect())
    }

    fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Option<Vec<u8>>> {
        let map = self.lock()?;
        let Some(data) = map.get(key) else {
            return Ok(None);
        };
        let slice = usize::try_from(offset)
            .ok()
            .zip(usize::try_from(length).ok())
            .and_then(|(start, len)| data.get(start..start.checked_add(len)?));
        let Some(slice) = slice else {
            return Err(PackdexError::Storage(format!(
                "{key}: wanted {length} bytes at {offset}, object has {}",
                data.len()
            )));
        };
        Ok(Some(slice.to_vec()))
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.lock()?.get(key).map(|d| d.len() as u64))
    }
}
