use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::CryptoEngine;
use crate::error::{PackdexError, Result};
use crate::storage::StorageBackend;
use crate::types::{BlobHandle, BlobId, BlobType, PackId};

use super::format::{open_object, seal_object, ObjectType};

/// Magic bytes at the start of every pack file.
pub const PACK_MAGIC: &[u8; 8] = b"PDXPACK\0";
/// Pack format version.
pub const PACK_VERSION: u8 = 1;
/// Size of the pack preamble (magic + version byte).
pub const PACK_HEADER_SIZE: usize = 9;

const PACK_HEADER_CONTEXT: &[u8] = b"pack-header";

/// Location of one blob inside a pack, as recorded in the pack's trailing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackEntry {
    pub id: BlobId,
    #[serde(rename = "type")]
    pub blob_type: BlobType,
    pub offset: u64,
    pub length: u64,
}

impl PackEntry {
    pub fn handle(&self) -> BlobHandle {
        BlobHandle::new(self.id, self.blob_type)
    }
}

/// A finished pack: its content-derived id, the bytes to upload and its header.
#[derive(Debug)]
pub struct SealedPack {
    pub id: PackId,
    pub bytes: Vec<u8>,
    pub entries: Vec<PackEntry>,
}

/// Accumulates already-encrypted blobs into a single pack file.
///
/// Layout: `[magic][version]` then `[4B length LE][blob]` per blob, then the
/// enveloped header and a trailing 4-byte LE header length.
#[derive(Debug, Default)]
pub struct PackWriter {
    pack_bytes: Vec<u8>,
    entries: Vec<PackEntry>,
}

impl PackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a blob. Returns the offset where the blob data starts
    /// (after its 4-byte length prefix). Blobs that do not fit the prefix
    /// are rejected and leave the writer unchanged.
    pub fn add_blob(&mut self, id: BlobId, blob_type: BlobType, blob: &[u8]) -> Result<u64> {
        let prefix = length_prefix(blob.len())?;
        if self.pack_bytes.is_empty() {
            self.pack_bytes.extend_from_slice(PACK_MAGIC);
            self.pack_bytes.push(PACK_VERSION);
        }
        self.pack_bytes.extend_from_slice(&prefix);
        let offset = self.pack_bytes.len() as u64;
        self.pack_bytes.extend_from_slice(blob);

        self.entries.push(PackEntry {
            id,
            blob_type,
            offset,
            length: blob.len() as u64,
        });
        Ok(offset)
    }

    pub fn blob_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the header trailer and compute the pack id.
    pub fn seal(self, crypto: &dyn CryptoEngine) -> Result<SealedPack> {
        if self.entries.is_empty() {
            return Err(PackdexError::Other("cannot seal empty pack writer".into()));
        }
        let Self {
            mut pack_bytes,
            entries,
        } = self;

        let header_bytes = rmp_serde::to_vec(&entries)?;
        let encrypted_header = seal_object(
            ObjectType::PackHeader,
            PACK_HEADER_CONTEXT,
            &header_bytes,
            crypto,
        )?;
        let header_len = u32::try_from(encrypted_header.len())
            .map_err(|_| PackdexError::InvalidFormat("pack header too large".into()))?;
        pack_bytes.extend_from_slice(&encrypted_header);
        pack_bytes.extend_from_slice(&header_len.to_le_bytes());

        let id = PackId::compute(&pack_bytes);
        Ok(SealedPack {
            id,
            bytes: pack_bytes,
            entries,
        })
    }
}

fn length_prefix(len: usize) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| {
            PackdexError::InvalidFormat(format!("blob of {len} bytes too large for a pack"))
        })
}

fn read_exact_range(
    storage: &dyn StorageBackend,
    pack_id: &PackId,
    key: &str,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>> {
    let data = storage
        .get_range(key, offset, length)?
        .ok_or(PackdexError::PackNotFound(*pack_id))?;
    if data.len() as u64 != length {
        return Err(PackdexError::InvalidFormat(format!(
            "short read on pack {pack_id}: expected {length} bytes, got {}",
            data.len()
        )));
    }
    Ok(data)
}

/// Read and decrypt the trailing header of a pack.
///
/// Only the preamble, the 4-byte length trailer and the header itself are
/// fetched; blob data is never downloaded.
pub fn read_pack_header(
    storage: &dyn StorageBackend,
    pack_id: &PackId,
    crypto: &dyn CryptoEngine,
) -> Result<Vec<PackEntry>> {
    let key = pack_id.storage_key();
    let size = storage
        .size(&key)?
        .ok_or(PackdexError::PackNotFound(*pack_id))?;

    let min_size = (PACK_HEADER_SIZE + 4) as u64;
    if size < min_size {
        return Err(PackdexError::InvalidFormat(format!(
            "pack too small: {size} bytes"
        )));
    }

    let preamble = read_exact_range(storage, pack_id, &key, 0, PACK_HEADER_SIZE as u64)?;
    if &preamble[..8] != PACK_MAGIC {
        return Err(PackdexError::InvalidFormat("invalid pack magic".into()));
    }
    if preamble[8] != PACK_VERSION {
        return Err(PackdexError::InvalidFormat(format!(
            "unsupported pack version {}",
            preamble[8]
        )));
    }

    let len_offset = size - 4;
    let len_bytes = read_exact_range(storage, pack_id, &key, len_offset, 4)?;
    let header_len = u32::from_le_bytes(
        len_bytes
            .as_slice()
            .try_into()
            .map_err(|_| PackdexError::InvalidFormat("invalid pack header length field".into()))?,
    ) as u64;

    if header_len > len_offset - PACK_HEADER_SIZE as u64 {
        return Err(PackdexError::InvalidFormat(
            "invalid pack header length".into(),
        ));
    }

    let header_start = len_offset - header_len;
    let encrypted_header = read_exact_range(storage, pack_id, &key, header_start, header_len)?;
    let header_bytes = open_object(
        &encrypted_header,
        ObjectType::PackHeader,
        PACK_HEADER_CONTEXT,
        crypto,
    )?;
    let entries: Vec<PackEntry> = rmp_serde::from_slice(&header_bytes)?;

    for entry in &entries {
        let end = entry.offset.checked_add(entry.length);
        if entry.offset < PACK_HEADER_SIZE as u64 || end.map_or(true, |end| end > header_start) {
            return Err(PackdexError::InvalidFormat(format!(
                "blob {} at [{}, +{}) lies outside the data section of pack {pack_id}",
                entry.id, entry.offset, entry.length
            )));
        }
    }

    debug!("pack {pack_id}: {} blobs in header", entries.len());
    Ok(entries)
}
