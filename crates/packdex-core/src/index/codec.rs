//! Index snapshot serialization.
//!
//! A snapshot is a self-describing MessagePack document (field names are
//! written out), so older readers can skip fields added later.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PackdexError, Result};
use crate::repo::pack::PackEntry;
use crate::types::{IndexId, PackId};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub version: u32,
    /// Snapshots this one replaces. Advisory; deletion is up to the caller.
    #[serde(default)]
    pub supersedes: Vec<IndexId>,
    pub packs: Vec<PackRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRecord {
    pub id: PackId,
    pub blobs: Vec<PackEntry>,
}

/// Serialize `packs` in pack id order. Identical input gives identical bytes.
pub fn encode(packs: &BTreeMap<PackId, Vec<PackEntry>>, supersedes: &[IndexId]) -> Result<Vec<u8>> {
    let doc = IndexDocument {
        version: INDEX_FORMAT_VERSION,
        supersedes: supersedes.to_vec(),
        packs: packs
            .iter()
            .map(|(id, entries)| PackRecord {
                id: *id,
                blobs: entries.clone(),
            })
            .collect(),
    };
    Ok(rmp_serde::to_vec_named(&doc)?)
}

pub fn decode(data: &[u8]) -> Result<IndexDocument> {
    let doc: IndexDocument = rmp_serde::from_slice(data)?;
    if doc.version != INDEX_FORMAT_VERSION {
        return Err(PackdexError::UnsupportedVersion(doc.version));
    }
    let mut seen = BTreeSet::new();
    for record in &doc.packs {
        if !seen.insert(record.id) {
            return Err(PackdexError::InvalidFormat(format!(
                "pack {} listed twice in one snapshot",
                record.id
            )));
        }
    }
    Ok(doc)
}

impl IndexDocument {
    /// Pack records as a map, for comparison against what was encoded.
    pub fn into_pack_map(self) -> BTreeMap<PackId, Vec<PackEntry>> {
        self.packs.into_iter().map(|r| (r.id, r.blobs)).collect()
    }
}
