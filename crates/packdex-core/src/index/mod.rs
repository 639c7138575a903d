pub mod codec;

pub(crate) mod builder;
mod persist;
mod rebuild;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;

use crate::error::{PackdexError, Result};
use crate::repo::pack::PackEntry;
use crate::types::{BlobHandle, IndexId, PackId};

pub use persist::save;

/// The blobs stored in one pack, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    entries: Vec<PackEntry>,
}

impl Pack {
    pub(crate) fn new(entries: Vec<PackEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: &BlobHandle) -> bool {
        self.entries.iter().any(|e| e.handle() == *handle)
    }

    /// Same entries in the same header order. Records listing the same
    /// blobs in another order disagree.
    pub(crate) fn same_entries(&self, other: &[PackEntry]) -> bool {
        self.entries.as_slice() == other
    }
}

/// Where one copy of a blob can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobLocation {
    pub pack_id: PackId,
    pub offset: u64,
    pub length: u64,
}

/// In-memory index of every pack in a repository and the blobs they hold.
///
/// Built by [`Index::rebuild`] (scan every pack header) or [`Index::load`]
/// (merge persisted snapshots). Immutable once returned, so any number of
/// threads may query it at once; callers wanting a fresh view build a new one.
#[derive(Debug, Clone, Default)]
pub struct Index {
    packs: HashMap<PackId, Pack>,
    /// Reverse map. `blobs[h]` contains `p` iff `packs[p]` has an entry for `h`.
    blobs: HashMap<BlobHandle, BTreeSet<PackId>>,
    index_ids: BTreeSet<IndexId>,
    superseded: BTreeSet<IndexId>,
    untrusted: BTreeSet<PackId>,
}

impl Index {
    /// Insert a pack and its reverse entries in one step.
    pub(crate) fn insert_pack(&mut self, pack_id: PackId, pack: Pack) {
        for entry in pack.entries() {
            self.blobs.entry(entry.handle()).or_default().insert(pack_id);
        }
        self.packs.insert(pack_id, pack);
    }

    /// Remove a pack and every reverse entry pointing at it.
    pub(crate) fn remove_pack(&mut self, pack_id: &PackId) -> Option<Pack> {
        let pack = self.packs.remove(pack_id)?;
        for entry in pack.entries() {
            let handle = entry.handle();
            if let Some(holders) = self.blobs.get_mut(&handle) {
                holders.remove(pack_id);
                if holders.is_empty() {
                    self.blobs.remove(&handle);
                }
            }
        }
        Some(pack)
    }

    pub fn pack(&self, id: &PackId) -> Option<&Pack> {
        self.packs.get(id)
    }

    pub fn packs(&self) -> impl Iterator<Item = (&PackId, &Pack)> {
        self.packs.iter()
    }

    pub fn pack_ids(&self) -> BTreeSet<PackId> {
        self.packs.keys().copied().collect()
    }

    pub fn contains_pack(&self, id: &PackId) -> bool {
        self.packs.contains_key(id)
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Number of distinct (id, type) blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    pub fn contains(&self, handle: &BlobHandle) -> bool {
        self.blobs.contains_key(handle)
    }

    /// Packs holding a copy of `handle`.
    pub fn packs_containing(&self, handle: &BlobHandle) -> Option<&BTreeSet<PackId>> {
        self.blobs.get(handle)
    }

    /// Every stored copy of `handle`, ordered by pack id.
    pub fn lookup(&self, handle: &BlobHandle) -> Vec<BlobLocation> {
        let Some(holders) = self.blobs.get(handle) else {
            return Vec::new();
        };
        holders
            .iter()
            .filter_map(|pack_id| self.packs.get(pack_id).map(|pack| (pack_id, pack)))
            .flat_map(|(pack_id, pack)| {
                pack.entries()
                    .iter()
                    .filter(|e| e.handle() == *handle)
                    .map(|e| BlobLocation {
                        pack_id: *pack_id,
                        offset: e.offset,
                        length: e.length,
                    })
            })
            .collect()
    }

    /// Blobs stored in more than one pack.
    pub fn duplicate_blobs(&self) -> BTreeSet<BlobHandle> {
        self.blobs
            .iter()
            .filter(|(_, holders)| holders.len() > 1)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Packs holding at least one of `handles`. Unknown handles are ignored.
    pub fn packs_for_blobs<'a>(
        &self,
        handles: impl IntoIterator<Item = &'a BlobHandle>,
    ) -> BTreeSet<PackId> {
        let mut packs = BTreeSet::new();
        for handle in handles {
            if let Some(holders) = self.blobs.get(handle) {
                packs.extend(holders.iter().copied());
            }
        }
        packs
    }

    /// Snapshots merged to build this index. Empty after a rebuild.
    pub fn index_ids(&self) -> &BTreeSet<IndexId> {
        &self.index_ids
    }

    /// Loaded snapshots that another loaded snapshot declares it supersedes.
    /// Safe to delete.
    pub fn superseded(&self) -> &BTreeSet<IndexId> {
        &self.superseded
    }

    /// Packs dropped by a lenient load because snapshots disagreed on them.
    pub fn untrusted(&self) -> &BTreeSet<PackId> {
        &self.untrusted
    }

    /// Entries of the packs accepted by `filter`, ready to hand to [`save`].
    pub fn pack_entries<F>(&self, mut filter: F) -> BTreeMap<PackId, Vec<PackEntry>>
    where
        F: FnMut(&PackId, &Pack) -> bool,
    {
        self.packs
            .iter()
            .filter(|(id, pack)| filter(*id, *pack))
            .map(|(id, pack)| (*id, pack.entries.clone()))
            .collect()
    }

    /// Packs known here but absent from `other`, e.g. packs a rebuild found
    /// that no persisted snapshot covers yet.
    pub fn packs_not_in(&self, other: &Index) -> BTreeSet<PackId> {
        self.packs
            .keys()
            .filter(|id| !other.packs.contains_key(id))
            .copied()
            .collect()
    }
}

/// Build the worker pool for a parallel index operation.
/// `threads == 1` means run on the calling thread.
fn build_pool(threads: usize) -> Result<Option<rayon::ThreadPool>> {
    if threads == 1 {
        return Ok(None);
    }

    // 0 means use all available cores (rayon default).
    let mut builder = rayon::ThreadPoolBuilder::new();
    if threads > 1 {
        builder = builder.num_threads(threads);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| PackdexError::Other(format!("failed to create rayon thread pool: {e}")))
}

/// Run `f` for every item, stopping at the first error.
fn try_for_each_item<T, F>(items: &[T], threads: usize, f: F) -> Result<()>
where
    T: Sync,
    F: Fn(&T) -> Result<()> + Sync + Send,
{
    match build_pool(threads)? {
        Some(pool) => pool.install(|| items.par_iter().try_for_each(&f)),
        None => items.iter().try_for_each(&f),
    }
}
