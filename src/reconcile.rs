//! Reconciliation of local files against the remote index
//!
//! This is where every decision about what has to change is taken. The
//! reconciler walks the local tree once and compares each file with the
//! remote record under the same key:
//!
//! 1. no remote record: upload, `missing at remote`
//! 2. local modification time not strictly after the remote one: unchanged,
//!    and the file is never read
//! 3. local modification time strictly after the remote one: checksum the
//!    file and upload only if the digest differs from the stored one
//!
//! Every local key is recorded as touched. Once the walk is complete the
//! remote keys that were never touched have no local counterpart and become
//! deletes, `no longer present locally`.
//!
//! ## Ordering
//!
//! Uploads follow local walk order. Deletes are only known after the walk
//! and come last, sorted by key.
//!
//! ## Two phases
//!
//! The walk itself is sequential and only classifies files. Files whose
//! timestamps prove nothing are collected and checksummed afterwards, in
//! parallel when more than one worker is configured. Any walk or read error
//! aborts the reconciliation and no plan is returned.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsync::reconcile::Reconciler;
//! use azsync::remote_index::RemoteIndex;
//! use azsync::scanner::LocalScanner;
//! use azsync::store::MemoryStore;
//!
//! # fn main() -> azsync::Result<()> {
//! let store = MemoryStore::new();
//! let index = RemoteIndex::fetch(&store)?;
//! let plan = Reconciler::new().reconcile(&index, &LocalScanner::new("./public"))?;
//! for op in &plan.operations {
//!     println!("{} {} ({})", op.kind, op.path, op.reason);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SyncError};
use crate::remote_index::RemoteIndex;
use crate::scanner::LocalScanner;
use crate::types::{
    ContentChecksum, LocalFileRecord, ReconcileStats, RemoteObjectRecord, SyncOperation, SyncPlan,
};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, trace};

/// Reason attached to uploads of files the container does not have
pub const REASON_MISSING_AT_REMOTE: &str = "missing at remote";
/// Reason attached to deletes of objects with no local file
pub const REASON_NO_LONGER_LOCAL: &str = "no longer present locally";

/// Outcome of the walk phase for one local file
enum Pending<'a> {
    Upload(SyncOperation),
    Verify {
        record: LocalFileRecord,
        remote: &'a RemoteObjectRecord,
    },
}

/// Diff engine turning a remote index and a local tree into a [`SyncPlan`]
#[derive(Debug, Clone)]
pub struct Reconciler {
    parallel_workers: usize,
}

impl Reconciler {
    /// Create a reconciler that checksums on the calling thread
    pub fn new() -> Self {
        Self {
            parallel_workers: 1,
        }
    }

    /// Checksum candidate files on up to `workers` threads (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Reconcile the tree under `scanner` against `index`
    pub fn reconcile(&self, index: &RemoteIndex, scanner: &LocalScanner) -> Result<SyncPlan> {
        self.reconcile_records(index, scanner.files())
    }

    /// Reconcile any sequence of local records against `index`
    ///
    /// The first `Err` in `local` aborts the reconciliation.
    pub fn reconcile_records<I>(&self, index: &RemoteIndex, local: I) -> Result<SyncPlan>
    where
        I: IntoIterator<Item = Result<LocalFileRecord>>,
    {
        let mut stats = ReconcileStats {
            remote_objects: index.len(),
            ..Default::default()
        };
        let mut touched: HashSet<String> = HashSet::new();
        let mut pending: Vec<Pending<'_>> = Vec::new();

        for record in local {
            let record = record?;
            stats.local_files += 1;
            touched.insert(record.relative_path.clone());

            match index.get(&record.relative_path) {
                None => {
                    debug!("{}: {}", record.relative_path, REASON_MISSING_AT_REMOTE);
                    pending.push(Pending::Upload(SyncOperation::upload(
                        record.relative_path.as_str(),
                        REASON_MISSING_AT_REMOTE,
                    )));
                }
                Some(remote) if record.mod_time > remote.last_modified => {
                    trace!(
                        "{}: modified locally ({} > {}), checking content",
                        record.relative_path,
                        record.mod_time,
                        remote.last_modified
                    );
                    pending.push(Pending::Verify { record, remote });
                }
                Some(_) => {
                    trace!("{}: unchanged", record.relative_path);
                }
            }
        }

        stats.checksummed = pending
            .iter()
            .filter(|item| matches!(item, Pending::Verify { .. }))
            .count();

        let mut operations: Vec<SyncOperation> =
            self.resolve(pending, stats.checksummed)?.into_iter().flatten().collect();
        stats.uploads = operations.len();

        let mut orphans: Vec<&str> = index
            .keys()
            .filter(|key| !touched.contains(*key))
            .collect();
        orphans.sort_unstable();
        for key in orphans {
            debug!("{}: {}", key, REASON_NO_LONGER_LOCAL);
            operations.push(SyncOperation::delete(key, REASON_NO_LONGER_LOCAL));
        }
        stats.deletes = operations.len() - stats.uploads;

        info!(
            "Reconciled {} local files against {} remote objects: {} uploads, {} deletes ({} checksummed)",
            stats.local_files, stats.remote_objects, stats.uploads, stats.deletes, stats.checksummed
        );

        Ok(SyncPlan { operations, stats })
    }

    /// Turn walk results into operations, checksumming where needed
    ///
    /// Output order matches `pending`; `None` marks a file whose content
    /// turned out to be unchanged.
    fn resolve(
        &self,
        pending: Vec<Pending<'_>>,
        candidates: usize,
    ) -> Result<Vec<Option<SyncOperation>>> {
        if self.parallel_workers <= 1 || candidates <= 1 {
            return pending.into_iter().map(resolve_pending).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_workers)
            .build()
            .map_err(|e| SyncError::WorkerPool(e.to_string()))?;

        pool.install(|| pending.into_par_iter().map(resolve_pending).collect())
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_pending(item: Pending<'_>) -> Result<Option<SyncOperation>> {
    match item {
        Pending::Upload(op) => Ok(Some(op)),
        Pending::Verify { record, remote } => {
            let local = record.checksum()?;
            if remote.content_checksum == Some(local) {
                debug!("{}: timestamp changed, content did not", record.relative_path);
                return Ok(None);
            }
            let reason = mismatch_reason(&record, remote, &local);
            debug!("{}: {}", record.relative_path, reason);
            Ok(Some(SyncOperation::upload(record.relative_path, reason)))
        }
    }
}

/// Reconcile `scanner` against `index` sequentially
pub fn reconcile(index: &RemoteIndex, scanner: &LocalScanner) -> Result<SyncPlan> {
    Reconciler::new().reconcile(index, scanner)
}

fn mismatch_reason(
    record: &LocalFileRecord,
    remote: &RemoteObjectRecord,
    local: &ContentChecksum,
) -> String {
    let remote_sum = remote
        .content_checksum
        .map(|sum| sum.to_hex())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "checksum mismatch {} vs {}, and {} > {}",
        local,
        remote_sum,
        record.mod_time.to_rfc3339(),
        remote.last_modified.to_rfc3339()
    )
}
