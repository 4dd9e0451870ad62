//! Core data types used throughout azsync
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Remote state**: [`RemoteObjectRecord`], one per object in the container
//! - **Local state**: [`LocalFileRecord`], one per regular file under the root
//! - **Decisions**: [`SyncOperation`] and [`SyncPlan`], the output of a reconciliation
//! - **Outcomes**: [`ExecutionSummary`], what the executor actually did
//!
//! Local and remote records share one key space: a forward-slash separated
//! path relative to the sync root (or the container root), with no leading
//! slash. Keys compare case-sensitively.

use crate::error::{Result, SyncError};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// MD5 digest of an object's content
///
/// This is the digest Azure Blob Storage records as `Content-MD5`, so local
/// and remote checksums can be compared byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentChecksum(pub [u8; 16]);

impl ContentChecksum {
    /// Compute the checksum of an in-memory buffer
    pub fn of(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// Build a checksum from a raw digest, if it has the right length
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Self)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hexadecimal form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One object currently stored in the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRecord {
    /// Object key relative to the container root
    pub key: String,
    /// Storage-side time the object was last written
    pub last_modified: DateTime<Utc>,
    /// Digest of the stored bytes, when the service recorded one
    ///
    /// A missing digest never matches a local checksum.
    pub content_checksum: Option<ContentChecksum>,
    /// Stored size in bytes
    pub size: u64,
}

/// One regular file found under the scan root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    /// Path relative to the root, in the remote key space
    pub relative_path: String,
    /// Absolute (root-joined) path on disk
    pub absolute_path: PathBuf,
    /// Last modification time reported by the filesystem
    pub mod_time: DateTime<Utc>,
    /// Size in bytes at scan time
    pub size: u64,
}

impl LocalFileRecord {
    /// Compute the content checksum by streaming the file
    ///
    /// This is a full read of the file and is only called when the
    /// modification time alone cannot prove the file unchanged.
    pub fn checksum(&self) -> Result<ContentChecksum> {
        utils::checksum_file(&self.absolute_path)
            .map_err(|e| SyncError::scan(&self.absolute_path, e))
    }
}

/// Kind of a pending change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Write the local file to the container, overwriting any existing object
    Upload,
    /// Remove the object from the container
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Upload => f.write_str("Upload"),
            OperationKind::Delete => f.write_str("Delete"),
        }
    }
}

/// One change decided by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// What to do
    pub kind: OperationKind,
    /// Key the operation applies to
    pub path: String,
    /// Why the reconciler selected this operation
    pub reason: String,
}

impl SyncOperation {
    /// Create an upload operation
    pub fn upload(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Upload,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a delete operation
    pub fn delete(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is an upload
    pub fn is_upload(&self) -> bool {
        self.kind == OperationKind::Upload
    }
}

/// Counters collected during one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Regular files found by the local walk
    pub local_files: usize,
    /// Objects in the remote index
    pub remote_objects: usize,
    /// Local files whose content checksum had to be computed
    pub checksummed: usize,
    /// Upload operations emitted
    pub uploads: usize,
    /// Delete operations emitted
    pub deletes: usize,
}

/// Ordered operation list produced by one reconciliation
///
/// Uploads come first in local walk order, followed by deletes in key order.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Operations in the order they must be applied
    pub operations: Vec<SyncOperation>,
    /// Counters describing how the plan was reached
    pub stats: ReconcileStats,
}

impl SyncPlan {
    /// Whether local and remote state already agree
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations in the plan
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Upload operations, in plan order
    pub fn uploads(&self) -> impl Iterator<Item = &SyncOperation> {
        self.operations.iter().filter(|op| op.kind == OperationKind::Upload)
    }

    /// Delete operations, in plan order
    pub fn deletes(&self) -> impl Iterator<Item = &SyncOperation> {
        self.operations.iter().filter(|op| op.kind == OperationKind::Delete)
    }
}

/// What an executor run applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Objects written
    pub uploaded: usize,
    /// Objects removed
    pub deleted: usize,
    /// Total bytes submitted to the store
    pub bytes_uploaded: u64,
    /// Wall-clock time spent applying operations
    pub duration: Duration,
}

impl ExecutionSummary {
    /// Total operations applied
    pub fn total(&self) -> usize {
        self.uploaded + self.deleted
    }
}
