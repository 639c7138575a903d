use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::ConsistencyMode;
use crate::error::{PackdexError, Result};
use crate::repo::pack::PackEntry;
use crate::types::{IndexId, PackId};

use super::codec::IndexDocument;
use super::{Index, Pack};

/// Index under construction, shared by the workers of a rebuild or load
/// behind a single mutex. Every method applies one pack (or one snapshot's
/// bookkeeping) completely while the lock is held.
pub(crate) struct IndexBuilder {
    index: Index,
    consistency: ConsistencyMode,
    supersedes: Vec<(IndexId, Vec<IndexId>)>,
}

impl IndexBuilder {
    pub(crate) fn new(consistency: ConsistencyMode) -> Self {
        Self {
            index: Index::default(),
            consistency,
            supersedes: Vec::new(),
        }
    }

    /// Add a pack read straight from its header.
    pub(crate) fn add_pack(&mut self, pack_id: PackId, entries: Vec<PackEntry>) {
        self.index.insert_pack(pack_id, Pack::new(entries));
    }

    /// Merge one pack record from snapshot `index_id`.
    ///
    /// Pack ids are content-derived, so a second record for the same pack
    /// must list the same blobs. A mismatch is an error in strict mode; in
    /// lenient mode the pack is dropped and ignored from then on.
    pub(crate) fn merge_pack(
        &mut self,
        index_id: IndexId,
        pack_id: PackId,
        entries: Vec<PackEntry>,
    ) -> Result<()> {
        if self.index.untrusted.contains(&pack_id) {
            return Ok(());
        }
        let Some(existing) = self.index.packs.get(&pack_id) else {
            self.index.insert_pack(pack_id, Pack::new(entries));
            return Ok(());
        };
        if existing.same_entries(&entries) {
            return Ok(());
        }
        match self.consistency {
            ConsistencyMode::Strict => Err(PackdexError::InconsistentPack { pack_id, index_id }),
            ConsistencyMode::Lenient => {
                warn!("pack {pack_id} has conflicting entries in index {index_id}, dropping it");
                self.index.remove_pack(&pack_id);
                self.index.untrusted.insert(pack_id);
                Ok(())
            }
        }
    }

    /// Merge every pack of a decoded snapshot and record its id.
    pub(crate) fn merge_snapshot(&mut self, index_id: IndexId, doc: IndexDocument) -> Result<()> {
        debug!(
            "merging index {index_id}: {} packs, supersedes {}",
            doc.packs.len(),
            doc.supersedes.len()
        );
        for record in doc.packs {
            self.merge_pack(index_id, record.id, record.blobs)?;
        }
        self.index.index_ids.insert(index_id);
        if !doc.supersedes.is_empty() {
            self.supersedes.push((index_id, doc.supersedes));
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Index {
        let mut superseded = BTreeSet::new();
        for (newer, older) in &self.supersedes {
            for old in older {
                if self.index.index_ids.contains(old) {
                    debug!("index {old} is superseded by {newer}");
                    superseded.insert(*old);
                }
            }
        }
        self.index.superseded = superseded;
        self.index
    }
}

pub(crate) fn lock_builder(shared: &Mutex<IndexBuilder>) -> Result<MutexGuard<'_, IndexBuilder>> {
    shared
        .lock()
        .map_err(|_| PackdexError::Other("index builder lock poisoned".into()))
}

pub(crate) fn into_index(shared: Mutex<IndexBuilder>) -> Result<Index> {
    shared
        .into_inner()
        .map(IndexBuilder::finish)
        .map_err(|_| PackdexError::Other("index builder lock poisoned".into()))
}
