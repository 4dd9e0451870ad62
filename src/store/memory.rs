//! In-memory object store
//!
//! [`MemoryStore`] keeps objects in a sorted map behind a lock and serves
//! listings in fixed-size pages, with the last key of a page acting as the
//! continuation marker. Failures can be injected per listing page, per key
//! on put and delete, and on the connectivity check, which makes it the
//! store of choice for exercising the reconciler and executor end to end.

use super::{ObjectListing, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{ContentChecksum, OperationKind, RemoteObjectRecord};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use tracing::trace;

/// Default number of objects per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object held by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes
    pub content: Vec<u8>,
    /// Content type submitted with the object
    pub content_type: String,
    /// Digest recorded for the object
    pub checksum: Option<ContentChecksum>,
    /// Time the object was last written
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct FailurePlan {
    connection: bool,
    list_page: Option<usize>,
    put_keys: HashSet<String>,
    delete_keys: HashSet<String>,
}

/// Thread-safe in-memory container
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    page_size: usize,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failures: Mutex<FailurePlan>,
    history: Mutex<Vec<(OperationKind, String)>>,
}

impl MemoryStore {
    /// Create an empty store with the default page size
    pub fn new() -> Self {
        Self {
            name: "memory://".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            objects: RwLock::new(BTreeMap::new()),
            failures: Mutex::new(FailurePlan::default()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Serve listings in pages of `page_size` objects (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed an object with an explicit modification time
    ///
    /// The checksum is computed from `content`, as the service would.
    pub fn insert(&self, key: impl Into<String>, content: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) {
        let content = content.into();
        let checksum = Some(ContentChecksum::of(&content));
        self.insert_object(
            key,
            StoredObject {
                content,
                content_type: "application/octet-stream".to_string(),
                checksum,
                last_modified,
            },
        );
    }

    /// Seed an object exactly as given
    pub fn insert_object(&self, key: impl Into<String>, object: StoredObject) {
        self.objects.write().insert(key.into(), object);
    }

    /// Look up an object by key
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().get(key).cloned()
    }

    /// All keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Successful puts and deletes, in the order they were applied
    pub fn history(&self) -> Vec<(OperationKind, String)> {
        self.history.lock().clone()
    }

    /// Make `check_connection` fail
    pub fn fail_connection(&self) {
        self.failures.lock().connection = true;
    }

    /// Make the listing fail when serving the given 1-based page
    pub fn fail_listing_on_page(&self, page: usize) {
        self.failures.lock().list_page = Some(page);
    }

    /// Make every put of `key` fail
    pub fn fail_put(&self, key: impl Into<String>) {
        self.failures.lock().put_keys.insert(key.into());
    }

    /// Make every delete of `key` fail
    pub fn fail_delete(&self, key: impl Into<String>) {
        self.failures.lock().delete_keys.insert(key.into());
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        *self.failures.lock() = FailurePlan::default();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_connection(&self) -> StoreResult<()> {
        if self.failures.lock().connection {
            return Err(StoreError::backend("injected connection failure"));
        }
        Ok(())
    }

    fn list_objects(&self, marker: Option<&str>) -> StoreResult<ObjectListing> {
        let objects = self.objects.read();

        // Pages are cut at fixed offsets, so the page number follows from
        // how many keys sort at or before the marker.
        let consumed = marker
            .map(|m| {
                objects
                    .range::<str, _>((Bound::Unbounded, Bound::Included(m)))
                    .count()
            })
            .unwrap_or(0);
        let page = consumed / self.page_size + 1;

        if self.failures.lock().list_page == Some(page) {
            return Err(StoreError::backend(format!(
                "injected listing failure on page {}",
                page
            )));
        }

        let lower = match marker {
            Some(m) => Bound::Excluded(m),
            None => Bound::Unbounded,
        };
        let mut remaining = objects.range::<str, _>((lower, Bound::Unbounded));

        let records: Vec<RemoteObjectRecord> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| RemoteObjectRecord {
                key: key.clone(),
                last_modified: object.last_modified,
                content_checksum: object.checksum,
                size: object.content.len() as u64,
            })
            .collect();

        let next_marker = if remaining.next().is_some() {
            records.last().map(|r| r.key.clone())
        } else {
            None
        };

        trace!("Served listing page {} with {} objects", page, records.len());
        Ok(ObjectListing {
            objects: records,
            next_marker,
        })
    }

    fn put_object(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
        checksum: &ContentChecksum,
    ) -> StoreResult<()> {
        if self.failures.lock().put_keys.contains(key) {
            return Err(StoreError::backend(format!("injected put failure for '{}'", key)));
        }

        let stored = ContentChecksum::of(&content);
        if stored != *checksum {
            return Err(StoreError::ChecksumMismatch {
                key: key.to_string(),
                sent: checksum.to_hex(),
                stored: stored.to_hex(),
            });
        }

        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: content_type.to_string(),
                checksum: Some(stored),
                last_modified: Utc::now(),
            },
        );
        self.history.lock().push((OperationKind::Upload, key.to_string()));
        Ok(())
    }

    fn delete_object(&self, key: &str) -> StoreResult<()> {
        if self.failures.lock().delete_keys.contains(key) {
            return Err(StoreError::backend(format!("injected delete failure for '{}'", key)));
        }

        if self.objects.write().remove(key).is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.history.lock().push((OperationKind::Delete, key.to_string()));
        Ok(())
    }
}
