//! Main test module for azsync
//!
//! This module includes all test suites:
//! - Integration tests for full sync runs
//! - Chaos tests for failure injection
//! - Property-based tests for the reconciliation rules

pub mod integration;
pub mod chaos;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::azsync::*;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory_deletes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        store.insert("a", "1", old);
        store.insert("b/c", "2", old);

        let syncer = Syncer::new(store.clone(), temp_dir.path().to_path_buf()).unwrap();
        let plan = syncer.plan().unwrap();
        assert_eq!(plan.stats.deletes, 2);
        assert_eq!(plan.stats.uploads, 0);

        syncer.apply(&plan, &TracingObserver).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_everywhere_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let syncer = Syncer::new(Arc::new(MemoryStore::new()), temp_dir.path().to_path_buf()).unwrap();
        let plan = syncer.plan().unwrap();
        assert!(plan.is_empty());
        let summary = syncer.apply(&plan, &TracingObserver).unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_empty_file_is_uploaded() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("empty.txt"), "").unwrap();
        let store = Arc::new(MemoryStore::new());

        let syncer = Syncer::new(store.clone(), temp_dir.path().to_path_buf()).unwrap();
        let (_, summary) = syncer.sync(&TracingObserver).unwrap();
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.bytes_uploaded, 0);
        assert_eq!(store.get("empty.txt").unwrap().checksum, Some(ContentChecksum::of(b"")));
    }

    #[test]
    fn test_unicode_and_spaces_in_keys() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("ünï cødé")).unwrap();
        fs::write(temp_dir.path().join("ünï cødé/fïlé 1.txt"), "x").unwrap();

        let plan = Syncer::new(Arc::new(MemoryStore::new()), temp_dir.path().to_path_buf())
            .unwrap()
            .plan()
            .unwrap();
        assert_eq!(plan.operations[0].path, "ünï cødé/fïlé 1.txt");
    }
}
