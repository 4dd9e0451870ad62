//! Integration tests for azsync
//!
//! Drives full sync runs against a [`MemoryStore`] over randomly generated
//! trees and checks that the container converges to the local tree.

use ::azsync::*;
use filetime::FileTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Local mtimes are pinned well before anything the store records, so a
/// freshly uploaded object is never older than its local file.
const LOCAL_MTIME: i64 = 1_500_000_000;

/// Test harness pairing a local tree with an in-memory container
pub struct SyncTestHarness {
    pub temp_dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub rng: StdRng,
}

impl SyncTestHarness {
    /// Create a new harness with a seeded generator
    pub fn new(seed: u64) -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            store: Arc::new(MemoryStore::new().with_page_size(16)),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn syncer(&self, workers: usize) -> Syncer {
        SyncerBuilder::new()
            .parallel_workers(workers)
            .build(self.store.clone(), self.root().to_path_buf())
            .unwrap()
    }

    /// Write a file and pin its modification time
    pub fn write(&self, key: &str, content: &[u8], mtime: i64) {
        let path = self.root().join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    /// Generate `count` files spread over a few nested directories
    pub fn generate_tree(&mut self, count: usize) {
        for i in 0..count {
            let depth = self.rng.random_range(0..3);
            let mut key = String::new();
            for d in 0..depth {
                key.push_str(&format!("dir{}_{}/", d, self.rng.random_range(0..3)));
            }
            key.push_str(&format!("file{:03}.dat", i));
            let len = self.rng.random_range(0..2048);
            let content: Vec<u8> = (0..len).map(|_| self.rng.random()).collect();
            self.write(&key, &content, LOCAL_MTIME);
        }
    }

    /// Local tree as `key -> content`
    pub fn local_state(&self) -> BTreeMap<String, Vec<u8>> {
        LocalScanner::new(self.root())
            .scan()
            .unwrap()
            .into_iter()
            .map(|record| {
                let content = fs::read(&record.absolute_path).unwrap();
                (record.relative_path, content)
            })
            .collect()
    }

    /// Container as `key -> content`
    pub fn remote_state(&self) -> BTreeMap<String, Vec<u8>> {
        self.store
            .keys()
            .into_iter()
            .map(|key| {
                let content = self.store.get(&key).unwrap().content;
                (key, content)
            })
            .collect()
    }
}

#[test]
fn test_sync_converges_and_is_idempotent() {
    let mut harness = SyncTestHarness::new(42);
    harness.generate_tree(60);
    let syncer = harness.syncer(4);

    let (plan, summary) = syncer.sync(&TracingObserver).unwrap();
    assert_eq!(plan.stats.uploads, 60);
    assert_eq!(summary.uploaded, 60);
    assert_eq!(harness.local_state(), harness.remote_state());

    let second = syncer.plan().unwrap();
    assert!(second.is_empty(), "second plan not empty: {:?}", second.operations);
}

#[test]
fn test_changes_between_runs() {
    let mut harness = SyncTestHarness::new(7);
    harness.generate_tree(20);
    let syncer = harness.syncer(1);
    syncer.sync(&TracingObserver).unwrap();

    // Remove one file, rewrite another, add a new one
    let local = harness.local_state();
    let keys: Vec<&String> = local.keys().collect();
    fs::remove_file(harness.root().join(keys[0])).unwrap();
    let changed = keys[1].clone();
    harness.write(&changed, b"rewritten", chrono::Utc::now().timestamp() + 3600);
    harness.write("added/new.txt", b"new", LOCAL_MTIME);

    let plan = syncer.plan().unwrap();
    let uploads: Vec<&str> = plan.uploads().map(|op| op.path.as_str()).collect();
    let deletes: Vec<&str> = plan.deletes().map(|op| op.path.as_str()).collect();
    assert_eq!(deletes, vec![keys[0].as_str()]);
    assert_eq!(uploads.len(), 2);
    assert!(uploads.contains(&changed.as_str()));
    assert!(uploads.contains(&"added/new.txt"));

    syncer.apply(&plan, &TracingObserver).unwrap();
    assert_eq!(harness.local_state(), harness.remote_state());
}

#[test]
fn test_parallel_and_sequential_plans_agree() {
    let mut harness = SyncTestHarness::new(99);
    harness.generate_tree(40);
    let future = chrono::Utc::now().timestamp() + 3600;
    let old = chrono::DateTime::from_timestamp(LOCAL_MTIME - 10, 0).unwrap();

    // Half the files already exist remotely with older timestamps, some
    // with stale content, some identical
    let local = harness.local_state();
    for (i, (key, content)) in local.iter().enumerate() {
        match i % 4 {
            0 => harness.store.insert(key.clone(), content.clone(), old),
            1 => harness.store.insert(key.clone(), b"stale".to_vec(), old),
            _ => {}
        }
    }
    harness.store.insert("orphan/one", "x", old);
    harness.store.insert("orphan/two", "y", old);
    for key in local.keys() {
        filetime::set_file_mtime(harness.root().join(key), FileTime::from_unix_time(future, 0))
            .unwrap();
    }

    let sequential = harness.syncer(1).plan().unwrap();
    let parallel = harness.syncer(8).plan().unwrap();
    assert_eq!(sequential.operations, parallel.operations);
    assert_eq!(sequential.stats, parallel.stats);
    assert_eq!(sequential.stats.deletes, 2);
}

#[test]
fn test_practice_run_leaves_container_alone() {
    let mut harness = SyncTestHarness::new(3);
    harness.generate_tree(10);
    let syncer = harness.syncer(2);

    let plan = syncer.plan().unwrap();
    let mut out = Vec::new();
    syncer.report(&plan, ReportFormat::Json, &mut out).unwrap();

    let reported: Vec<SyncOperation> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(reported, plan.operations);
    assert!(harness.store.is_empty());
    assert!(harness.store.history().is_empty());
}
