use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::{PackdexError, Result};
use crate::repo::pack::PackEntry;
use crate::repo::Repository;
use crate::types::{IndexId, PackId};

use super::builder::{into_index, lock_builder, IndexBuilder};
use super::{codec, try_for_each_item, Index};

impl Index {
    /// Build an index by merging every persisted snapshot. Pack bodies are
    /// never touched.
    ///
    /// A snapshot that cannot be decoded fails the load with
    /// [`PackdexError::IndexDecode`]. Packs described differently by two
    /// snapshots are handled according to `config.consistency`.
    pub fn load(repo: &Repository, config: &IndexConfig) -> Result<Index> {
        config.validate()?;

        let index_ids = repo.list_index_snapshots()?;
        info!("loading {} index snapshots", index_ids.len());

        let shared = Mutex::new(IndexBuilder::new(config.consistency));
        try_for_each_item(&index_ids, config.load_threads, |index_id| {
            let plaintext = repo.read_index_snapshot(index_id)?;
            let doc = codec::decode(&plaintext)
                .map_err(|e| PackdexError::index_decode(*index_id, e))?;
            lock_builder(&shared)?.merge_snapshot(*index_id, doc)
        })?;

        let index = into_index(shared)?;
        info!(
            "loaded index: {} packs, {} blobs from {} snapshots ({} superseded)",
            index.pack_count(),
            index.blob_count(),
            index.index_ids().len(),
            index.superseded().len()
        );
        Ok(index)
    }
}

/// Persist `packs` as a new index snapshot and return its id.
///
/// `supersedes` names the snapshots the new one replaces. Nothing is deleted
/// here: once this returns, the caller may remove those snapshots. A crash
/// before that leaves old and new snapshots side by side, which
/// [`Index::load`] accepts.
pub fn save(
    repo: &Repository,
    packs: &BTreeMap<PackId, Vec<PackEntry>>,
    supersedes: &[IndexId],
) -> Result<IndexId> {
    let data = codec::encode(packs, supersedes)?;
    debug!("encoded {} packs into {} bytes", packs.len(), data.len());
    let id = repo.write_index_snapshot(&data)?;
    info!(
        "saved index {id} with {} packs, superseding {} snapshots",
        packs.len(),
        supersedes.len()
    );
    Ok(id)
}
