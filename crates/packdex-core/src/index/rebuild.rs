use std::sync::Mutex;

use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::{PackdexError, Result};
use crate::repo::Repository;

use super::builder::{into_index, lock_builder, IndexBuilder};
use super::{try_for_each_item, Index};

impl Index {
    /// Build an index from scratch by reading the header of every pack.
    ///
    /// Any pack whose header cannot be read fails the whole rebuild with
    /// [`PackdexError::PackHeader`]; a partial index is never returned.
    pub fn rebuild(repo: &Repository, config: &IndexConfig) -> Result<Index> {
        config.validate()?;

        let mut pack_ids = repo.list_packs()?;
        pack_ids.sort_unstable();
        pack_ids.dedup();
        info!("rebuilding index from {} packs", pack_ids.len());

        let shared = Mutex::new(IndexBuilder::new(config.consistency));
        try_for_each_item(&pack_ids, config.rebuild_threads, |pack_id| {
            let entries = repo
                .read_pack_header(pack_id)
                .map_err(|e| PackdexError::pack_header(*pack_id, e))?;
            debug!("pack {pack_id}: {} entries", entries.len());
            lock_builder(&shared)?.add_pack(*pack_id, entries);
            Ok(())
        })?;

        let index = into_index(shared)?;
        info!(
            "rebuilt index: {} packs, {} blobs",
            index.pack_count(),
            index.blob_count()
        );
        Ok(index)
    }
}
