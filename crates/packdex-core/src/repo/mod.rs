pub mod format;
pub mod pack;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PackdexConfig;
use crate::crypto::{CryptoEngine, PlaintextEngine};
use crate::error::{PackdexError, Result};
use crate::storage::{self, StorageBackend};
use crate::types::index_id::INDEX_PREFIX;
use crate::types::pack_id::PACKS_PREFIX;
use crate::types::{BlobId, IndexId, PackId};

use self::format::{open_object, seal_object, ObjectType};
use self::pack::{read_pack_header, PackEntry, PackWriter};

const INDEX_OBJECT_CONTEXT: &[u8] = b"index";

/// A handle to an opened repository: the storage backend plus the crypto
/// engine that seals metadata objects.
///
/// Every listing goes to the backend; nothing is cached between calls.
#[derive(Clone)]
pub struct Repository {
    pub storage: Arc<dyn StorageBackend>,
    pub crypto: Arc<dyn CryptoEngine>,
}

impl Repository {
    pub fn open(storage: Box<dyn StorageBackend>, crypto: Arc<dyn CryptoEngine>) -> Self {
        Self {
            storage: Arc::from(storage),
            crypto,
        }
    }

    /// Open the repository named by `config` without encryption.
    pub fn from_config(config: &PackdexConfig, blob_id_key: &[u8; 32]) -> Result<Self> {
        config.validate()?;
        let backend = storage::backend_from_config(&config.repository.storage_config())?;
        Ok(Self::open(backend, Arc::new(PlaintextEngine::new(blob_id_key))))
    }

    /// Id of `data` under this repository's blob id key.
    pub fn blob_id(&self, data: &[u8]) -> BlobId {
        BlobId::compute(self.crypto.blob_id_key(), data)
    }

    /// Every pack currently stored, in backend order.
    pub fn list_packs(&self) -> Result<Vec<PackId>> {
        let keys = self.storage.list(PACKS_PREFIX)?;
        let mut ids = Vec::with_capacity(keys.len());
        for key in &keys {
            match PackId::from_storage_key(key) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("skipping invalid pack key '{key}': {e}"),
            }
        }
        debug!("listed {} packs", ids.len());
        Ok(ids)
    }

    /// Every index snapshot currently stored, in backend order.
    pub fn list_index_snapshots(&self) -> Result<Vec<IndexId>> {
        let keys = self.storage.list(INDEX_PREFIX)?;
        let mut ids = Vec::with_capacity(keys.len());
        for key in &keys {
            match IndexId::from_storage_key(key) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("skipping invalid index key '{key}': {e}"),
            }
        }
        debug!("listed {} index snapshots", ids.len());
        Ok(ids)
    }

    pub fn read_pack_header(&self, pack_id: &PackId) -> Result<Vec<PackEntry>> {
        read_pack_header(self.storage.as_ref(), pack_id, self.crypto.as_ref())
    }

    /// Fetch a snapshot object and return its decrypted codec bytes.
    ///
    /// Backend failures are returned as-is. Content that does not hash to
    /// `id` or does not open is an [`PackdexError::IndexDecode`].
    pub fn read_index_snapshot(&self, id: &IndexId) -> Result<Vec<u8>> {
        let stored = self
            .storage
            .get(&id.storage_key())?
            .ok_or(PackdexError::IndexNotFound(*id))?;
        if IndexId::compute(&stored) != *id {
            return Err(PackdexError::index_decode(
                *id,
                PackdexError::InvalidFormat("content does not match snapshot id".into()),
            ));
        }
        open_object(
            &stored,
            ObjectType::IndexSnapshot,
            INDEX_OBJECT_CONTEXT,
            self.crypto.as_ref(),
        )
        .map_err(|e| PackdexError::index_decode(*id, e))
    }

    /// Seal `plaintext` and store it as a new snapshot object.
    ///
    /// The id is derived from the stored bytes, so writing the same snapshot
    /// twice is a no-op the second time.
    pub fn write_index_snapshot(&self, plaintext: &[u8]) -> Result<IndexId> {
        let stored = seal_object(
            ObjectType::IndexSnapshot,
            INDEX_OBJECT_CONTEXT,
            plaintext,
            self.crypto.as_ref(),
        )?;
        let id = IndexId::compute(&stored);
        let key = id.storage_key();
        if self.storage.exists(&key)? {
            debug!("index snapshot {id} already stored");
            return Ok(id);
        }
        self.storage.put(&key, &stored)?;
        debug!("stored index snapshot {id} ({} bytes)", stored.len());
        Ok(id)
    }

    pub fn delete_index_snapshot(&self, id: &IndexId) -> Result<()> {
        self.storage.delete(&id.storage_key())
    }

    /// Seal and upload a pack. Returns its id and header entries.
    pub fn write_pack(&self, writer: PackWriter) -> Result<(PackId, Vec<PackEntry>)> {
        let sealed = writer.seal(self.crypto.as_ref())?;
        self.storage.put(&sealed.id.storage_key(), &sealed.bytes)?;
        debug!("stored pack {} with {} blobs", sealed.id, sealed.entries.len());
        Ok((sealed.id, sealed.entries))
    }

    pub fn delete_pack(&self, id: &PackId) -> Result<()> {
        self.storage.delete(&id.storage_key())
    }
}
