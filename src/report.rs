//! Rendering plans without applying them
//!
//! Practice runs print the operations a sync would perform, in exactly the
//! order the executor would apply them. Nothing here touches the network or
//! the filesystem; output goes to whatever writer the caller passes in.

use crate::types::{ExecutionSummary, OperationKind, SyncOperation, SyncPlan};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output format for rendered operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One human-readable line per operation
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Writes operations and summaries in a [`ReportFormat`]
#[derive(Debug, Clone)]
pub struct OperationReporter {
    root: PathBuf,
    format: ReportFormat,
}

impl OperationReporter {
    /// Create a reporter for uploads read from below `root`
    pub fn new(root: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Local root shown as the upload source
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render a single operation as one line, without the newline
    pub fn render(&self, operation: &SyncOperation) -> io::Result<String> {
        match self.format {
            ReportFormat::Text => Ok(match operation.kind {
                OperationKind::Upload => format!(
                    "Upload ({}) {}/{} as {}",
                    operation.reason,
                    self.root.display(),
                    operation.path,
                    operation.path
                ),
                OperationKind::Delete => {
                    format!("Delete ({}) {}", operation.reason, operation.path)
                }
            }),
            ReportFormat::Json => serde_json::to_string(operation).map_err(io::Error::from),
        }
    }

    /// Write every operation of `plan`, in plan order
    pub fn write_operations<W: Write>(&self, plan: &SyncPlan, out: &mut W) -> io::Result<()> {
        for operation in &plan.operations {
            writeln!(out, "{}", self.render(operation)?)?;
        }
        Ok(())
    }

    /// One-line description of a plan
    pub fn plan_summary(plan: &SyncPlan) -> String {
        let stats = &plan.stats;
        format!(
            "{} local files, {} remote objects, {} checksummed: {} to upload, {} to delete",
            stats.local_files, stats.remote_objects, stats.checksummed, stats.uploads, stats.deletes
        )
    }

    /// One-line description of an applied plan
    pub fn execution_summary(summary: &ExecutionSummary) -> String {
        format!(
            "{} uploaded ({} bytes), {} deleted in {}",
            summary.uploaded,
            summary.bytes_uploaded,
            summary.deleted,
            format_elapsed(summary.duration)
        )
    }
}

/// Human-readable elapsed time, rounded down to whole milliseconds
pub fn format_elapsed(duration: Duration) -> String {
    humantime::format_duration(Duration::from_millis(duration.as_millis() as u64)).to_string()
}
