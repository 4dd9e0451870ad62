//! Chaos testing for azsync
//!
//! Injects failures into the store and the local tree at every stage and
//! checks that a run either completes or stops without damage: nothing is
//! applied unless the plan was complete, and execution stops at the first
//! failing operation.

use ::azsync::*;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

fn tree(files: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..files {
        let path = dir.path().join(format!("d{}/f{:03}.txt", i % 3, i));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("content {}", i)).unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_500_000_000, 0))
            .unwrap();
    }
    dir
}

fn store_with_orphans(count: usize, page_size: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new().with_page_size(page_size));
    let old = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    for i in 0..count {
        store.insert(format!("orphan/{:03}", i), "x", old);
    }
    store
}

#[test]
fn chaos_listing_failure_on_any_page() {
    let dir = tree(5);
    for failing_page in 1..=4 {
        let store = store_with_orphans(30, 10);
        store.fail_listing_on_page(failing_page);
        let syncer = Syncer::new(store.clone(), dir.path().to_path_buf()).unwrap();

        match syncer.sync(&TracingObserver) {
            Err(SyncError::RemoteListing { page, .. }) => {
                assert!(failing_page <= 3);
                assert_eq!(page, failing_page);
                assert_eq!(store.len(), 30);
                assert!(store.history().is_empty());
            }
            // 30 objects in pages of 10 never reach page 4
            Ok((plan, _)) => {
                assert_eq!(failing_page, 4);
                assert_eq!(plan.stats.deletes, 30);
            }
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
}

#[test]
fn chaos_connection_failure() {
    let dir = tree(2);
    let store = Arc::new(MemoryStore::new());
    store.fail_connection();
    let syncer = Syncer::new(store.clone(), dir.path().to_path_buf()).unwrap();

    let err = syncer.check_connection().unwrap_err();
    assert!(matches!(err, SyncError::RemoteConnect { .. }));
    assert!(err.user_message().contains("Check the account name"));
}

#[test]
fn chaos_random_put_failure_is_fail_fast() {
    let mut rng = StdRng::seed_from_u64(1234);
    for round in 0..5 {
        let dir = tree(12);
        let store = store_with_orphans(4, 1000);
        let syncer = SyncerBuilder::new()
            .parallel_workers(1)
            .build(store.clone(), dir.path().to_path_buf())
            .unwrap();
        let plan = syncer.plan().unwrap();

        let victim_idx = rng.random_range(0..plan.stats.uploads);
        let victim = plan.operations[victim_idx].path.clone();
        store.fail_put(victim.clone());
        info!("round {}: failing upload of {}", round, victim);

        let err = syncer.apply(&plan, &TracingObserver).unwrap_err();
        match &err {
            SyncError::Operation { kind, path, .. } => {
                assert_eq!(*kind, OperationKind::Upload);
                assert_eq!(path, &victim);
            }
            other => panic!("unexpected error {:?}", other),
        }

        // Everything before the victim applied, nothing after it
        let applied: Vec<String> = store.history().into_iter().map(|(_, key)| key).collect();
        let expected: Vec<String> = plan.operations[..victim_idx]
            .iter()
            .map(|op| op.path.clone())
            .collect();
        assert_eq!(applied, expected);
        assert_eq!(store.keys().iter().filter(|k| k.starts_with("orphan/")).count(), 4);
    }
}

#[test]
fn chaos_delete_failure_after_uploads() {
    let dir = tree(3);
    let store = store_with_orphans(3, 1000);
    store.fail_delete("orphan/001");
    let syncer = SyncerBuilder::new()
        .parallel_workers(3)
        .build(store.clone(), dir.path().to_path_buf())
        .unwrap();

    let err = syncer.sync(&TracingObserver).unwrap_err();
    assert_eq!(err.stage(), "execute");
    assert!(err.to_string().contains("Delete of 'orphan/001' failed"));

    // All uploads finished before any delete started
    let history = store.history();
    let uploads = history.iter().filter(|(k, _)| *k == OperationKind::Upload).count();
    assert_eq!(uploads, 3);
    assert!(store.get("orphan/001").is_some());

    // Retrying after the fault clears converges
    store.clear_failures();
    syncer.sync(&TracingObserver).unwrap();
    assert!(syncer.plan().unwrap().is_empty());
    assert_eq!(store.len(), 3);
}

#[test]
fn chaos_file_vanishes_between_plan_and_apply() {
    let dir = tree(4);
    let store = Arc::new(MemoryStore::new());
    let syncer = Syncer::new(store.clone(), dir.path().to_path_buf()).unwrap();
    let plan = syncer.plan().unwrap();

    fs::remove_file(dir.path().join(&plan.operations[0].path)).unwrap();
    let err = syncer.apply(&plan, &TracingObserver).unwrap_err();
    assert!(matches!(err, SyncError::Operation { kind: OperationKind::Upload, .. }));
}

#[cfg(unix)]
#[test]
fn chaos_unreadable_directory_aborts_plan() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tree(6);
    let locked = dir.path().join("d1");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    // Privileged users can read it anyway
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let store = store_with_orphans(2, 1000);
    let syncer = Syncer::new(store.clone(), dir.path().to_path_buf()).unwrap();
    let result = syncer.plan();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(SyncError::LocalScan { .. })));
    assert_eq!(store.len(), 2);
}

#[cfg(unix)]
#[test]
fn chaos_unreadable_changed_file_aborts_plan() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tree(1);
    let path = dir.path().join("d0/f000.txt");
    let future = Utc::now().timestamp() + 3600;
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(future, 0)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&path).is_ok() {
        return;
    }

    let store = Arc::new(MemoryStore::new());
    store.insert("d0/f000.txt", "old", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    let syncer = Syncer::new(store, dir.path().to_path_buf()).unwrap();
    let result = syncer.plan();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    assert!(matches!(result, Err(SyncError::LocalScan { .. })));
}
