//! Remote object index
//!
//! [`RemoteIndex::fetch`] drains a container listing page by page and
//! returns the complete `key -> record` mapping. The fetch is
//! all-or-nothing: if any page fails, everything gathered from earlier
//! pages is dropped and a [`SyncError::RemoteListing`] naming the failing
//! page is returned. A reconciliation must never run against a partial
//! view of the container, since every missing key would turn into a
//! spurious upload and the orphan detection would be wrong.
//!
//! The index is read-only once built. The reconciler tracks which keys it
//! has matched on its own and never mutates the index.

use crate::error::{Result, SyncError};
use crate::store::ObjectStore;
use crate::types::RemoteObjectRecord;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Complete snapshot of a container's objects
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    records: HashMap<String, RemoteObjectRecord>,
}

impl RemoteIndex {
    /// Fetch every object in the container, following continuation markers
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteListing`] if any page fetch fails.
    pub fn fetch(store: &dyn ObjectStore) -> Result<Self> {
        let mut records = HashMap::new();
        let mut marker: Option<String> = None;
        let mut page = 0usize;

        loop {
            page += 1;
            let listing = store
                .list_objects(marker.as_deref())
                .map_err(|source| SyncError::RemoteListing { page, source })?;

            debug!(
                "Listing page {} from {}: {} objects",
                page,
                store.name(),
                listing.objects.len()
            );

            for record in listing.objects {
                if let Some(previous) = records.insert(record.key.clone(), record) {
                    warn!("Key '{}' listed more than once; keeping the later entry", previous.key);
                }
            }

            match listing.next_marker {
                Some(next) if Some(&next) == marker.as_ref() => {
                    return Err(SyncError::RemoteListing {
                        page,
                        source: crate::error::StoreError::backend(format!(
                            "listing did not advance past marker {:?}",
                            next
                        )),
                    });
                }
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        info!(
            "Indexed {} remote objects from {} in {} page(s)",
            records.len(),
            store.name(),
            page
        );
        Ok(Self { records })
    }

    /// Build an index from records already in hand
    pub fn from_records(records: impl IntoIterator<Item = RemoteObjectRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.key.clone(), record))
                .collect(),
        }
    }

    /// Look up the record for `key` (case-sensitive)
    pub fn get(&self, key: &str) -> Option<&RemoteObjectRecord> {
        self.records.get(key)
    }

    /// Whether the container holds `key`
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// All keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// All records, in no particular order
    pub fn records(&self) -> impl Iterator<Item = &RemoteObjectRecord> {
        self.records.values()
    }

    /// Number of indexed objects
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
