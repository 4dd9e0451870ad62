//! Error types for azsync
//!
//! Every failure surfaced by the library is a [`SyncError`]. Each variant
//! corresponds to one stage of a sync run (loading the account file,
//! connecting, listing the container, scanning the local tree, executing
//! operations) and carries enough context to act on: which file, which key,
//! which listing page.
//!
//! Object store implementations report their own failures as [`StoreError`];
//! the stage that called the store wraps it into the matching `SyncError`
//! variant so the kind of failure survives up to the caller unchanged.

use crate::types::OperationKind;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the azsync library
pub type Result<T> = std::result::Result<T, SyncError>;

/// Boxed error used where a stage can fail for several unrelated reasons
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Account configuration could not be read, parsed or validated
    #[error("failed to load account configuration from {path:?}: {source}")]
    ConfigLoad {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Credentials rejected or container unreachable
    #[error("failed to connect to {store}: {source}")]
    RemoteConnect {
        /// Human readable store name
        store: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// A page of the remote listing could not be fetched
    #[error("failed to list remote objects (page {page}): {source}")]
    RemoteListing {
        /// 1-based page number that failed
        page: usize,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// The local walk hit an unreadable entry
    #[error("failed to scan {path:?}: {source}")]
    LocalScan {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// An individual upload or delete failed during execution
    #[error("{kind} of '{path}' failed: {source}")]
    Operation {
        /// Kind of the failing operation
        kind: OperationKind,
        /// Key of the failing operation
        path: String,
        /// Underlying failure (local read or remote call)
        #[source]
        source: BoxError,
    },

    /// A plan report could not be written to its destination
    #[error("failed to write report: {0}")]
    Report(#[source] std::io::Error),

    /// A worker thread pool could not be started
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// Invalid programmatic configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SyncError {
    /// Create a local scan error for `path`
    pub fn scan(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalScan {
            path: path.into(),
            source,
        }
    }

    /// Create an operation error for the operation on `path`
    pub fn operation(kind: OperationKind, path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SyncError::Operation {
            kind,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Name of the stage that produced this error
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::ConfigLoad { .. } => "config",
            SyncError::RemoteConnect { .. } => "connect",
            SyncError::RemoteListing { .. } => "listing",
            SyncError::LocalScan { .. } => "scan",
            SyncError::Operation { .. } => "execute",
            SyncError::Report(_) => "report",
            SyncError::WorkerPool(_) => "workers",
            SyncError::InvalidConfiguration(_) => "config",
        }
    }

    /// Get a user-friendly single-line message with a hint where one helps
    pub fn user_message(&self) -> String {
        match self {
            SyncError::RemoteConnect { store, source } => {
                format!(
                    "Could not reach {}: {}. Check the account name, key and container name.",
                    store, source
                )
            }
            SyncError::RemoteListing { page, source } => {
                format!(
                    "Listing the container failed on page {}: {}. Nothing was changed.",
                    page, source
                )
            }
            SyncError::LocalScan { path, source } => {
                format!(
                    "Could not read {:?}: {}. Nothing was changed.",
                    path, source
                )
            }
            SyncError::Operation { kind, path, source } => {
                format!(
                    "{} of '{}' failed: {}. Operations before it were applied.",
                    kind, path, source
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result alias for object store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by [`ObjectStore`](crate::store::ObjectStore) implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object or container does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The service stored different bytes than were sent
    #[error("checksum mismatch for '{key}' - sent: {sent}, stored: {stored}")]
    ChecksumMismatch {
        /// Object key
        key: String,
        /// Digest of the uploaded content
        sent: String,
        /// Digest reported by the service
        stored: String,
    },

    /// Any other failure reported by the backend
    #[error("{0}")]
    Backend(String),

    /// I/O failure inside the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a backend error with a custom message
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}
