use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::crypto::PlaintextEngine;
use crate::error::{PackdexError, Result};
use crate::index::{self, Pack};
use crate::repo::pack::{PackEntry, PackWriter};
use crate::repo::Repository;
use crate::storage::{MemoryBackend, StorageBackend};
use crate::types::{BlobId, BlobType, IndexId, PackId};

/// Fixed blob ID key for deterministic tests.
pub fn test_blob_id_key() -> [u8; 32] {
    [0xAA; 32]
}

pub fn blob_id(data: &[u8]) -> BlobId {
    BlobId::compute(&test_blob_id_key(), data)
}

pub fn repo_with(storage: impl StorageBackend + 'static) -> Repository {
    Repository::open(
        Box::new(storage),
        Arc::new(PlaintextEngine::new(&test_blob_id_key())),
    )
}

/// Plaintext repository backed by a `MemoryBackend`.
pub fn test_repo() -> Repository {
    repo_with(MemoryBackend::new())
}

/// Write one pack holding `blobs` (content, type) in order.
pub fn write_pack(repo: &Repository, blobs: &[(&[u8], BlobType)]) -> (PackId, Vec<PackEntry>) {
    let mut writer = PackWriter::new();
    for (data, blob_type) in blobs {
        writer
            .add_blob(repo.blob_id(data), *blob_type, data)
            .unwrap();
    }
    repo.write_pack(writer).unwrap()
}

/// Deterministic blob content for pack `pack` of session `session`.
fn blob_content(session: usize, pack: usize, blob: usize) -> Vec<u8> {
    format!("session {session} pack {pack} blob {blob}").into_bytes()
}

/// A repository filled by `sessions` simulated backup runs. Each run writes
/// `packs_per_session` packs of `blobs_per_pack` blobs and saves one index
/// snapshot covering them.
///
/// With `duplicate` set, the first blob of every session after the first is a
/// copy of the first blob of session 0, stored in a new pack.
pub struct FilledRepo {
    pub repo: Repository,
    pub packs: BTreeMap<PackId, Vec<PackEntry>>,
    pub index_ids: Vec<IndexId>,
}

pub fn create_filled_repo(
    sessions: usize,
    packs_per_session: usize,
    blobs_per_pack: usize,
    duplicate: bool,
) -> FilledRepo {
    let repo = test_repo();
    let mut packs = BTreeMap::new();
    let mut index_ids = Vec::new();

    for session in 0..sessions {
        let mut session_packs = BTreeMap::new();
        for pack in 0..packs_per_session {
            let mut writer = PackWriter::new();
            for blob in 0..blobs_per_pack {
                let content = if duplicate && session > 0 && pack == 0 && blob == 0 {
                    blob_content(0, 0, 0)
                } else {
                    blob_content(session, pack, blob)
                };
                let blob_type = if blob % 4 == 3 {
                    BlobType::Tree
                } else {
                    BlobType::Data
                };
                writer
                    .add_blob(repo.blob_id(&content), blob_type, &content)
                    .unwrap();
            }
            let (pack_id, entries) = repo.write_pack(writer).unwrap();
            session_packs.insert(pack_id, entries);
        }
        index_ids.push(index::save(&repo, &session_packs, &[]).unwrap());
        packs.extend(session_packs);
    }

    FilledRepo {
        repo,
        packs,
        index_ids,
    }
}

/// Entries of a pack sorted, for order-independent comparison.
pub fn sorted_entries(pack: &Pack) -> Vec<PackEntry> {
    let mut entries = pack.entries().to_vec();
    entries.sort();
    entries
}

/// Storage wrapper that fails selected operations. Delegates everything else
/// to an inner `MemoryBackend`.
#[derive(Clone, Default)]
pub struct FaultyBackend {
    inner: Arc<MemoryBackend>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
    failing_prefixes: Arc<Mutex<HashSet<String>>>,
    fail_puts: Arc<Mutex<bool>>,
}

impl FaultyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads of `key` fail from now on.
    pub fn fail_reads_of(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Listing `prefix` fails from now on.
    pub fn fail_listing(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .insert(prefix.to_string());
    }

    pub fn fail_puts(&self, fail: bool) {
        *self.fail_puts.lock().unwrap() = fail;
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(PackdexError::Storage(format!("injected read failure on {key}")));
        }
        Ok(())
    }
}

impl StorageBackend for FaultyBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_key(key)?;
        self.inner.get(key)
    }
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if *self.fail_puts.lock().unwrap() {
            return Err(PackdexError::Storage(format!("injected write failure on {key}")));
        }
        self.inner.put(key, data)
    }
    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }
    fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key)
    }
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.failing_prefixes.lock().unwrap().contains(prefix) {
            return Err(PackdexError::Storage(format!("injected list failure on {prefix}")));
        }
        self.inner.list(prefix)
    }
    fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Option<Vec<u8>>> {
        self.check_key(key)?;
        self.inner.get_range(key, offset, length)
    }
    fn size(&self, key: &str) -> Result<Option<u64>> {
        self.check_key(key)?;
        self.inner.size(key)
    }
}

/// Storage wrapper that counts bytes handed out by reads.
#[derive(Clone, Default)]
pub struct CountingBackend {
    inner: Arc<MemoryBackend>,
    bytes_read: Arc<Mutex<u64>>,
    lists: Arc<Mutex<u64>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_read(&self) -> u64 {
        *self.bytes_read.lock().unwrap()
    }

    pub fn list_calls(&self) -> u64 {
        *self.lists.lock().unwrap()
    }

    fn record(&self, data: &Option<Vec<u8>>) {
        if let Some(d) = data {
            *self.bytes_read.lock().unwrap() += d.len() as u64;
        }
    }
}

impl StorageBackend for CountingBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self.inner.get(key)?;
        self.record(&data);
        Ok(data)
    }
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inner.put(key, data)
    }
    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }
    fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key)
    }
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        *self.lists.lock().unwrap() += 1;
        self.inner.list(prefix)
    }
    fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Option<Vec<u8>>> {
        let data = self.inner.get_range(key, offset, length)?;
        self.record(&data);
        Ok(data)
    }
    fn size(&self, key: &str) -> Result<Option<u64>> {
        self.inner.size(key)
    }
}
