mod rebuild;

use std::collections::BTreeSet;

use crate::index::Index;
use crate::types::BlobHandle;

/// `blobs[h]` contains `p` iff `packs[p]` has an entry for `h`.
pub(super) fn assert_reverse_map_consistent(index: &Index) {
    let mut all_handles = BTreeSet::new();
    let mut pairs = 0;
    for (pack_id, pack) in index.packs() {
        let handles: BTreeSet<BlobHandle> = pack.entries().iter().map(|e| e.handle()).collect();
        for handle in &handles {
            let holders = index
                .packs_containing(handle)
                .unwrap_or_else(|| panic!("{handle} of pack {pack_id} not indexed"));
            assert!(holders.contains(pack_id), "{handle} not mapped to {pack_id}");
        }
        pairs += handles.len();
        all_handles.extend(handles);
    }

    assert_eq!(index.blob_count(), all_handles.len());
    let reverse_pairs: usize = all_handles
        .iter()
        .map(|h| index.packs_containing(h).map_or(0, BTreeSet::len))
        .sum();
    assert_eq!(reverse_pairs, pairs);
}
