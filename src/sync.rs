//! Sync entry point
//!
//! [`Syncer`] ties an object store, a local root and the run options
//! together and drives one synchronization through its stages:
//!
//! 1. **connect**: check that the store is reachable
//! 2. **plan**: fetch the remote index, walk the local tree, reconcile
//! 3. **apply** or **report**: execute the plan, or print it
//!
//! Nothing is written to the store before the plan is complete.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use azsync::{AccountCredentials, AzureBlobStore, SyncerBuilder, TracingObserver};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let account = AccountCredentials::load(Path::new("account.json"))?;
//! let store = Arc::new(AzureBlobStore::new(&account)?);
//!
//! let syncer = SyncerBuilder::new()
//!     .parallel_workers(4)
//!     .build(store, PathBuf::from("./public"))?;
//!
//! syncer.check_connection()?;
//! let plan = syncer.plan()?;
//! let summary = syncer.apply(&plan, &TracingObserver)?;
//! println!("{} uploaded, {} deleted", summary.uploaded, summary.deleted);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SyncError};
use crate::executor::{ExecutionObserver, Executor};
use crate::reconcile::Reconciler;
use crate::remote_index::RemoteIndex;
use crate::report::{OperationReporter, ReportFormat};
use crate::scanner::LocalScanner;
use crate::store::ObjectStore;
use crate::types::{ExecutionSummary, SyncPlan};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// One local directory synchronized into one container
pub struct Syncer {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
    parallel_workers: usize,
    follow_symlinks: bool,
}

impl std::fmt::Debug for Syncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Syncer")
            .field("store", &self.store.name())
            .field("root", &self.root)
            .field("parallel_workers", &self.parallel_workers)
            .field("follow_symlinks", &self.follow_symlinks)
            .finish()
    }
}

impl Syncer {
    /// Create a syncer with default options
    ///
    /// Shorthand for `SyncerBuilder::new().build(store, root)`.
    pub fn new(store: Arc<dyn ObjectStore>, root: PathBuf) -> Result<Self> {
        SyncerBuilder::new().build(store, root)
    }

    /// Local directory being synchronized
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store objects are written to
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Worker threads used for checksums and execution
    pub fn parallel_workers(&self) -> usize {
        self.parallel_workers
    }

    /// Check that the store is reachable
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteConnect`] naming the store.
    pub fn check_connection(&self) -> Result<()> {
        self.store
            .check_connection()
            .map_err(|source| SyncError::RemoteConnect {
                store: self.store.name().to_string(),
                source,
            })
    }

    /// Scanner over the local root with this syncer's options
    pub fn scanner(&self) -> LocalScanner {
        LocalScanner::new(&self.root).with_follow_symlinks(self.follow_symlinks)
    }

    /// Compute the operations that bring the container in line with the root
    ///
    /// Fails without a plan if the listing, the walk, or any checksum fails.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn plan(&self) -> Result<SyncPlan> {
        let start = Instant::now();
        let index = RemoteIndex::fetch(self.store.as_ref())?;
        let plan = Reconciler::new()
            .with_parallel_workers(self.parallel_workers)
            .reconcile(&index, &self.scanner())?;

        info!(
            "Planned {} uploads and {} deletes in {:?}",
            plan.stats.uploads,
            plan.stats.deletes,
            start.elapsed()
        );
        Ok(plan)
    }

    /// Apply `plan` to the store, reporting completions to `observer`
    pub fn apply(
        &self,
        plan: &SyncPlan,
        observer: &dyn ExecutionObserver,
    ) -> Result<ExecutionSummary> {
        Executor::new(self.store.as_ref(), &self.root, observer)
            .with_parallel_workers(self.parallel_workers)
            .apply(&plan.operations)
    }

    /// Plan and apply in one call
    pub fn sync(&self, observer: &dyn ExecutionObserver) -> Result<(SyncPlan, ExecutionSummary)> {
        let plan = self.plan()?;
        let summary = self.apply(&plan, observer)?;
        Ok((plan, summary))
    }

    /// Write `plan` to `out` instead of applying it
    pub fn report<W: Write>(&self, plan: &SyncPlan, format: ReportFormat, out: &mut W) -> Result<()> {
        OperationReporter::new(&self.root, format)
            .write_operations(plan, out)
            .map_err(SyncError::Report)
    }
}

/// Builder for [`Syncer`]
///
/// # Examples
///
/// ```rust
/// use azsync::SyncerBuilder;
///
/// let builder = SyncerBuilder::new()
///     .parallel_workers(8)
///     .follow_symlinks(false);
/// ```
#[derive(Debug, Clone)]
pub struct SyncerBuilder {
    parallel_workers: usize,
    follow_symlinks: bool,
}

impl SyncerBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            parallel_workers: num_cpus::get(),
            follow_symlinks: false,
        }
    }

    /// Set number of parallel workers
    ///
    /// Controls how many threads checksum candidate files and apply
    /// operations. With one worker everything runs on the calling thread.
    ///
    /// # Notes
    ///
    /// - Defaults to the number of CPU cores
    /// - Values less than 1 are automatically set to 1
    pub fn parallel_workers(mut self, count: usize) -> Self {
        self.parallel_workers = count.max(1);
        self
    }

    /// Set whether to follow symbolic links
    ///
    /// When disabled (default), links are skipped and never uploaded. When
    /// enabled, a link to a file is uploaded under the link's own key.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Build a [`Syncer`] for `root`
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfiguration`] if `root` is not a directory.
    pub fn build(self, store: Arc<dyn ObjectStore>, root: PathBuf) -> Result<Syncer> {
        if !root.is_dir() {
            return Err(SyncError::InvalidConfiguration(format!(
                "local root {:?} is not a directory",
                root
            )));
        }

        Ok(Syncer {
            store,
            root,
            parallel_workers: self.parallel_workers,
            follow_symlinks: self.follow_symlinks,
        })
    }
}

impl Default for SyncerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
