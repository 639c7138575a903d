use crate::config::IndexConfig;
use crate::error::PackdexError;
use crate::index::Index;
use crate::repo::pack::PackWriter;
use crate::testutil::{
    blob_id, create_filled_repo, repo_with, sorted_entries, test_repo, write_pack,
    CountingBackend, FaultyBackend,
};
use crate::types::{BlobType, PackId};

use super::assert_reverse_map_consistent;

fn sequential() -> IndexConfig {
    IndexConfig {
        rebuild_threads: 1,
        ..IndexConfig::default()
    }
}

#[test]
fn rebuild_covers_every_listed_pack() {
    let filled = create_filled_repo(3, 4, 8, false);
    let index = Index::rebuild(&filled.repo, &IndexConfig::default()).unwrap();

    let listed = filled.repo.list_packs().unwrap();
    assert_eq!(listed.len(), 12);
    for id in &listed {
        assert!(index.contains_pack(id), "pack {id} missing from index");
    }
    assert_eq!(index.pack_count(), listed.len());
    assert!(index.index_ids().is_empty());
    assert_reverse_map_consistent(&index);
}

#[test]
fn rebuild_preserves_header_order() {
    let filled = create_filled_repo(1, 2, 6, false);
    let index = Index::rebuild(&filled.repo, &IndexConfig::default()).unwrap();
    for (id, entries) in &filled.packs {
        assert_eq!(index.pack(id).unwrap().entries(), entries.as_slice());
    }
}

#[test]
fn rebuild_of_empty_repo_is_empty() {
    let repo = test_repo();
    let index = Index::rebuild(&repo, &IndexConfig::default()).unwrap();
    assert_eq!(index.pack_count(), 0);
    assert_eq!(index.blob_count(), 0);
}

#[test]
fn parallel_and_sequential_rebuilds_agree() {
    let filled = create_filled_repo(2, 5, 5, true);
    let parallel = Index::rebuild(
        &filled.repo,
        &IndexConfig {
            rebuild_threads: 4,
            ..IndexConfig::default()
        },
    )
    .unwrap();
    let serial = Index::rebuild(&filled.repo, &sequential()).unwrap();

    assert_eq!(parallel.pack_ids(), serial.pack_ids());
    assert_eq!(parallel.duplicate_blobs(), serial.duplicate_blobs());
    for (id, pack) in parallel.packs() {
        assert_eq!(pack, serial.pack(id).unwrap());
    }
}

#[test]
fn unreadable_pack_header_fails_rebuild() {
    let backend = FaultyBackend::new();
    let repo = repo_with(backend.clone());
    write_pack(&repo, &[(b"fine".as_slice(), BlobType::Data)]);
    let (broken, _) = write_pack(&repo, &[(b"broken".as_slice(), BlobType::Data)]);
    backend.fail_reads_of(&broken.storage_key());

    for threads in [1, 4] {
        let config = IndexConfig {
            rebuild_threads: threads,
            ..IndexConfig::default()
        };
        match Index::rebuild(&repo, &config) {
            Err(PackdexError::PackHeader { pack_id, source }) => {
                assert_eq!(pack_id, broken);
                assert!(matches!(*source, PackdexError::Storage(_)));
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("rebuild must fail on an unreadable header"),
        }
    }
}

#[test]
fn corrupt_pack_trailer_fails_rebuild() {
    let repo = test_repo();
    write_pack(&repo, &[(b"fine".as_slice(), BlobType::Data)]);
    let garbage = b"not a pack at all, just some bytes".to_vec();
    let bogus = PackId::compute(&garbage);
    repo.storage.put(&bogus.storage_key(), &garbage).unwrap();

    match Index::rebuild(&repo, &sequential()) {
        Err(PackdexError::PackHeader { pack_id, .. }) => assert_eq!(pack_id, bogus),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("rebuild must fail on a corrupt pack"),
    }
}

#[test]
fn pack_deleted_before_rebuild_is_absent() {
    let repo = test_repo();
    let (id, _) = write_pack(&repo, &[(b"blob".as_slice(), BlobType::Data)]);
    assert_eq!(repo.list_packs().unwrap(), vec![id]);
    repo.delete_pack(&id).unwrap();

    let index = Index::rebuild(&repo, &sequential()).unwrap();
    assert_eq!(index.pack_count(), 0);
    assert!(matches!(
        repo.read_pack_header(&id),
        Err(PackdexError::PackNotFound(p)) if p == id
    ));
}

#[test]
fn listing_failure_is_surfaced_unchanged() {
    let backend = FaultyBackend::new();
    let repo = repo_with(backend.clone());
    write_pack(&repo, &[(b"blob".as_slice(), BlobType::Data)]);
    backend.fail_listing("packs/");

    assert!(matches!(
        Index::rebuild(&repo, &IndexConfig::default()),
        Err(PackdexError::Storage(_))
    ));
}

#[test]
fn foreign_keys_under_packs_are_ignored() {
    let repo = test_repo();
    let (id, _) = write_pack(&repo, &[(b"blob".as_slice(), BlobType::Data)]);
    repo.storage.put("packs/README", b"hello").unwrap();
    repo.storage.put("packs/zz/not-a-pack", b"hello").unwrap();

    let index = Index::rebuild(&repo, &IndexConfig::default()).unwrap();
    assert_eq!(index.pack_ids().into_iter().collect::<Vec<_>>(), vec![id]);
}

#[test]
fn rebuild_reads_headers_without_pack_bodies() {
    let backend = CountingBackend::new();
    let repo = repo_with(backend.clone());
    let big = vec![0x5Au8; 1024 * 1024];
    let mut writer = PackWriter::new();
    writer.add_blob(blob_id(&big), BlobType::Data, &big).unwrap();
    writer
        .add_blob(blob_id(b"small"), BlobType::Tree, b"small")
        .unwrap();
    let (id, entries) = repo.write_pack(writer).unwrap();

    let index = Index::rebuild(&repo, &sequential()).unwrap();
    assert_eq!(sorted_entries(index.pack(&id).unwrap()).len(), entries.len());
    assert!(
        backend.bytes_read() < 4096,
        "rebuild read {} bytes",
        backend.bytes_read()
    );
}

#[test]
fn every_rebuild_relists_the_backend() {
    let backend = CountingBackend::new();
    let repo = repo_with(backend.clone());
    write_pack(&repo, &[(b"one".as_slice(), BlobType::Data)]);

    let first = Index::rebuild(&repo, &sequential()).unwrap();
    write_pack(&repo, &[(b"two".as_slice(), BlobType::Data)]);
    let second = Index::rebuild(&repo, &sequential()).unwrap();

    assert_eq!(backend.list_calls(), 2);
    assert_eq!(first.pack_count(), 1);
    assert_eq!(second.pack_count(), 2);
}

#[test]
fn invalid_config_is_rejected() {
    let repo = test_repo();
    let config = IndexConfig {
        rebuild_threads: 100_000,
        ..IndexConfig::default()
    };
    assert!(matches!(
        Index::rebuild(&repo, &config),
        Err(PackdexError::Config(_))
    ));
}
