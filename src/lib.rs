//! # azsync - Mirror a local directory into an object storage container
//!
//! Reconciles a local directory tree with a remote container so that, after
//! a sync, the container holds exactly one object per local file with
//! matching content, and nothing else.
//!
//! ## Overview
//!
//! A sync has three stages:
//!
//! - **Index**: list the whole container into a [`RemoteIndex`], following
//!   continuation markers. Any failed page aborts the run.
//! - **Reconcile**: walk the local tree and compare each file with the
//!   object under the same key, by modification time first and content
//!   checksum second. Produces an ordered [`SyncPlan`] of uploads and
//!   deletes, each with a human-readable reason.
//! - **Apply** or **report**: execute the plan against the store, failing
//!   fast, or print it for a practice run.
//!
//! The reconciler is the only component deciding what changes. The index
//! is read-only and deletes are computed after the walk as the remote keys
//! no local file touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azsync::{MemoryStore, SyncerBuilder, TracingObserver};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let syncer = SyncerBuilder::new().build(store, PathBuf::from("./public"))?;
//!
//! let plan = syncer.plan()?;
//! for operation in &plan.operations {
//!     println!("{} {} ({})", operation.kind, operation.path, operation.reason);
//! }
//! syncer.apply(&plan, &TracingObserver)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Decision rules
//!
//! For each local file, in walk order:
//!
//! | Remote state | Local state | Operation |
//! |---|---|---|
//! | no object under the key | any | upload, `missing at remote` |
//! | object exists | mtime not after remote | none, file not read |
//! | object exists | mtime after remote, same MD5 | none |
//! | object exists | mtime after remote, different or no MD5 | upload |
//!
//! Remote keys with no local file are deleted, `no longer present locally`,
//! after all uploads and in key order.
//!
//! ## Stores
//!
//! Stores implement the [`ObjectStore`] trait. [`MemoryStore`] keeps
//! objects in memory and can inject failures. With the `azblob` feature
//! (on by default), [`AzureBlobStore`] talks to Azure Blob Storage through
//! `opendal`.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`](error::Result) with a [`SyncError`]
//! whose [`stage`](SyncError::stage) names where the run stopped. Nothing
//! is written to the store unless the plan was computed completely.
//!
//! ## Module Organization
//!
//! - [`remote_index`]: container listing
//! - [`scanner`]: local tree walk
//! - [`reconcile`]: the diff engine
//! - [`executor`]: applying plans
//! - [`report`]: rendering plans for practice runs
//! - [`store`]: object store trait and implementations
//! - [`content_type`]: content type detection for uploads
//! - [`config`]: account configuration
//! - [`types`]: common types
//! - [`error`]: error types

// Public API modules
pub mod config;
pub mod content_type;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod remote_index;
pub mod report;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod types;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use config::AccountCredentials;
pub use error::{Result, StoreError, SyncError};
pub use executor::{ExecutionObserver, Executor, OperationOutcome, TracingObserver};
pub use reconcile::Reconciler;
pub use remote_index::RemoteIndex;
pub use report::{OperationReporter, ReportFormat};
pub use scanner::LocalScanner;
pub use store::{MemoryStore, ObjectListing, ObjectStore};
#[cfg(feature = "azblob")]
pub use store::AzureBlobStore;
pub use sync::{Syncer, SyncerBuilder};
pub use types::*;
