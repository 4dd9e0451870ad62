//! Local tree scanning
//!
//! [`LocalScanner`] walks a directory depth-first and yields one
//! [`LocalFileRecord`] per regular file, with its path already mapped into
//! the remote key space. The walk is lazy: records are produced as the
//! reconciler asks for them, and nothing is hashed up front. A file's
//! checksum is computed only when [`LocalFileRecord::checksum`] is called.
//!
//! ## Failure policy
//!
//! The first unreadable entry ends the walk with
//! [`SyncError::LocalScan`](crate::error::SyncError::LocalScan). Skipping it
//! would hide the file from the reconciler, which would then delete its
//! remote copy.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsync::scanner::LocalScanner;
//!
//! # fn main() -> azsync::Result<()> {
//! let scanner = LocalScanner::new("./public");
//! for record in scanner.files() {
//!     let record = record?;
//!     println!("{} ({} bytes)", record.relative_path, record.size);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SyncError};
use crate::types::LocalFileRecord;
use crate::utils;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Walks a local directory tree
#[derive(Debug, Clone)]
pub struct LocalScanner {
    root: PathBuf,
    follow_symlinks: bool,
}

impl LocalScanner {
    /// Create a scanner rooted at `root`
    ///
    /// Symbolic links are not followed by default; links are reported as
    /// non-regular entries and skipped.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
        }
    }

    /// Follow symbolic links, treating a link to a file as that file
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Root directory of the walk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate regular files, sorted by name within each directory
    pub fn files(&self) -> LocalFiles {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        LocalFiles {
            root: self.root.clone(),
            walker,
            finished: false,
        }
    }

    /// Walk the whole tree eagerly
    pub fn scan(&self) -> Result<Vec<LocalFileRecord>> {
        self.files().collect()
    }
}

/// Iterator over the regular files of a [`LocalScanner`]
///
/// After yielding an error the iterator is exhausted.
pub struct LocalFiles {
    root: PathBuf,
    walker: walkdir::IntoIter,
    finished: bool,
}

impl LocalFiles {
    fn record_for(&self, entry: &walkdir::DirEntry) -> Result<LocalFileRecord> {
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf());
            SyncError::scan(path, e.into())
        })?;
        let modified = metadata
            .modified()
            .map_err(|e| SyncError::scan(path, e))?;
        let relative_path =
            utils::path_to_key(path, &self.root).map_err(|e| SyncError::scan(path, e))?;

        Ok(LocalFileRecord {
            relative_path,
            absolute_path: path.to_path_buf(),
            mod_time: utils::system_time_to_utc(modified),
            size: metadata.len(),
        })
    }
}

impl Iterator for LocalFiles {
    type Item = Result<LocalFileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.finished = true;
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(SyncError::scan(path, e.into())));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                debug!("Skipping non-regular entry {:?}", entry.path());
                continue;
            }

            let record = self.record_for(&entry);
            match &record {
                Ok(record) => trace!("Found {}", record.relative_path),
                Err(_) => self.finished = true,
            }
            return Some(record);
        }
    }
}
