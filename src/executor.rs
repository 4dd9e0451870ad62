//! Applying a plan to the object store
//!
//! The [`Executor`] takes the operations produced by the reconciler and
//! applies them in order:
//!
//! - **Upload**: read the whole local file, detect its content type,
//!   checksum it, and put it under its key, replacing any existing object
//! - **Delete**: remove the object under its key
//!
//! Execution is fail-fast. The first failing operation stops the run and is
//! returned as [`SyncError::Operation`]; operations applied before it stay
//! applied and nothing after it is started.
//!
//! Completed operations are reported through an [`ExecutionObserver`]
//! passed in by the caller. [`TracingObserver`] logs one line per operation
//! with `tracing`.
//!
//! ## Parallel execution
//!
//! With more than one worker, uploads run concurrently on a bounded rayon
//! pool, then deletes do. No delete starts before every upload has
//! finished. Once any operation fails no new one is started, though those
//! already in flight run to completion. Observer calls are serialized.

use crate::content_type;
use crate::error::{Result, SyncError};
use crate::store::ObjectStore;
use crate::types::{ContentChecksum, ExecutionSummary, OperationKind, SyncOperation};
use crate::utils;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Details of one applied operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Content type submitted with an upload
    pub content_type: Option<&'static str>,
    /// Bytes submitted with an upload
    pub bytes: u64,
}

/// Receives a report for every operation the executor completes
pub trait ExecutionObserver: Send + Sync {
    /// Called once per successfully applied operation
    fn operation_completed(&self, operation: &SyncOperation, outcome: &OperationOutcome);
}

/// Observer that logs each completed operation at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn operation_completed(&self, operation: &SyncOperation, outcome: &OperationOutcome) {
        match operation.kind {
            OperationKind::Upload => info!(
                "Uploaded {} ({}, {} bytes)",
                operation.path,
                outcome.content_type.unwrap_or(content_type::OCTET_STREAM),
                outcome.bytes
            ),
            OperationKind::Delete => info!("Deleted {}", operation.path),
        }
    }
}

/// Applies sync operations against an [`ObjectStore`]
pub struct Executor<'a> {
    store: &'a dyn ObjectStore,
    root: PathBuf,
    observer: &'a dyn ExecutionObserver,
    parallel_workers: usize,
}

impl<'a> Executor<'a> {
    /// Create a sequential executor uploading files from below `root`
    pub fn new(
        store: &'a dyn ObjectStore,
        root: impl Into<PathBuf>,
        observer: &'a dyn ExecutionObserver,
    ) -> Self {
        Self {
            store,
            root: root.into(),
            observer,
            parallel_workers: 1,
        }
    }

    /// Apply independent operations on up to `workers` threads (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Local root uploads are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply `operations`, stopping at the first failure
    ///
    /// # Errors
    ///
    /// [`SyncError::Operation`] naming the kind and key of the operation
    /// that failed.
    pub fn apply(&self, operations: &[SyncOperation]) -> Result<ExecutionSummary> {
        let start = Instant::now();
        info!(
            "Applying {} operations to {}",
            operations.len(),
            self.store.name()
        );

        let summary = Mutex::new(ExecutionSummary::default());

        if self.parallel_workers <= 1 {
            for operation in operations {
                let outcome = self.apply_one(operation)?;
                self.record(&summary, operation, &outcome);
            }
        } else {
            let (uploads, deletes): (Vec<&SyncOperation>, Vec<&SyncOperation>) =
                operations.iter().partition(|op| op.is_upload());

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.parallel_workers)
                .build()
                .map_err(|e| SyncError::WorkerPool(e.to_string()))?;

            self.apply_batch(&pool, &uploads, &summary)?;
            self.apply_batch(&pool, &deletes, &summary)?;
        }

        let mut summary = summary.into_inner();
        summary.duration = start.elapsed();
        info!(
            "Applied {} operations ({} uploaded, {} deleted) in {:?}",
            summary.total(),
            summary.uploaded,
            summary.deleted,
            summary.duration
        );
        Ok(summary)
    }

    /// Apply one batch of independent operations concurrently
    fn apply_batch(
        &self,
        pool: &rayon::ThreadPool,
        batch: &[&SyncOperation],
        summary: &Mutex<ExecutionSummary>,
    ) -> Result<()> {
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<SyncError>> = Mutex::new(None);

        pool.install(|| {
            batch.par_iter().with_max_len(1).for_each(|operation| {
                if failed.load(Ordering::Acquire) {
                    return;
                }
                match self.apply_one(operation) {
                    Ok(outcome) => self.record(summary, operation, &outcome),
                    Err(e) => {
                        failed.store(true, Ordering::Release);
                        first_error.lock().get_or_insert(e);
                    }
                }
            });
        });

        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Count a completed operation and report it, one report at a time
    fn record(
        &self,
        summary: &Mutex<ExecutionSummary>,
        operation: &SyncOperation,
        outcome: &OperationOutcome,
    ) {
        let mut summary = summary.lock();
        match operation.kind {
            OperationKind::Upload => {
                summary.uploaded += 1;
                summary.bytes_uploaded += outcome.bytes;
            }
            OperationKind::Delete => summary.deleted += 1,
        }
        self.observer.operation_completed(operation, outcome);
    }

    fn apply_one(&self, operation: &SyncOperation) -> Result<OperationOutcome> {
        match operation.kind {
            OperationKind::Upload => self.upload(&operation.path),
            OperationKind::Delete => self.delete(&operation.path),
        }
    }

    fn upload(&self, key: &str) -> Result<OperationOutcome> {
        let path = utils::key_to_path(&self.root, key);
        let content = std::fs::read(&path).map_err(|e| {
            SyncError::operation(
                OperationKind::Upload,
                key,
                std::io::Error::new(e.kind(), format!("reading {:?}: {}", path, e)),
            )
        })?;

        let content_type = content_type::detect(key, &content);
        let checksum = ContentChecksum::of(&content);
        let bytes = content.len() as u64;
        debug!("Uploading {} as {} ({} bytes, md5 {})", key, content_type, bytes, checksum);

        self.store
            .put_object(key, content, content_type, &checksum)
            .map_err(|e| SyncError::operation(OperationKind::Upload, key, e))?;

        Ok(OperationOutcome {
            content_type: Some(content_type),
            bytes,
        })
    }

    fn delete(&self, key: &str) -> Result<OperationOutcome> {
        debug!("Deleting {}", key);
        self.store
            .delete_object(key)
            .map_err(|e| SyncError::operation(OperationKind::Delete, key, e))?;

        Ok(OperationOutcome {
            content_type: None,
            bytes: 0,
        })
    }
}
