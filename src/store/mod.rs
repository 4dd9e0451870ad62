//! Object store abstraction
//!
//! The reconciler and executor only ever talk to a container through the
//! [`ObjectStore`] trait: a paged listing, a whole-object put and a delete,
//! plus a cheap connectivity check used before any work starts. Vendor SDKs
//! live behind this trait so a different object store, or an in-memory
//! fake, can be substituted without touching the sync logic.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: a thread-safe in-memory container with configurable
//!   page size and failure injection, used by tests and for embedding
//! - `AzureBlobStore` (feature `azblob`): Azure Blob Storage through `opendal`

pub mod memory;

#[cfg(feature = "azblob")]
pub mod azblob;

use crate::error::StoreResult;
use crate::types::{ContentChecksum, RemoteObjectRecord};

pub use memory::MemoryStore;

#[cfg(feature = "azblob")]
pub use azblob::AzureBlobStore;

/// Timeout for metadata calls (stat, list, delete) in seconds
pub const OP_TIMEOUT_SECS: u64 = 60;
/// Timeout for data transfer calls in seconds
pub const IO_TIMEOUT_SECS: u64 = 300;

/// One page of a container listing
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// Objects on this page
    pub objects: Vec<RemoteObjectRecord>,
    /// Marker to pass to the next `list_objects` call, `None` when exhausted
    pub next_marker: Option<String>,
}

/// Capability interface to a remote container
///
/// Implementations must be usable from several threads at once; the
/// executor may issue puts and deletes in parallel.
pub trait ObjectStore: Send + Sync {
    /// Human readable name used in logs and error messages
    fn name(&self) -> &str;

    /// Verify credentials and container reachability
    fn check_connection(&self) -> StoreResult<()>;

    /// Fetch one page of the listing, starting after `marker`
    ///
    /// `None` requests the first page. Every stored object is returned,
    /// including placeholder blobs whose names end in `/`; synthetic
    /// prefixes that hold no object are not.
    fn list_objects(&self, marker: Option<&str>) -> StoreResult<ObjectListing>;

    /// Write `content` under `key`, overwriting any existing object
    fn put_object(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
        checksum: &ContentChecksum,
    ) -> StoreResult<()>;

    /// Remove the object stored under `key`
    fn delete_object(&self, key: &str) -> StoreResult<()>;
}
