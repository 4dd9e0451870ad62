//! Utility functions for azsync
//!
//! Hashing helpers and the path normalization that maps local files into
//! the remote key space.

use crate::types::ContentChecksum;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path};
use std::time::SystemTime;
use tracing::trace;

/// Hash a file's content with MD5 using buffered reads
///
/// The file is streamed through the hasher in 64KB chunks so large files
/// never need to be held in memory.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or a read
/// fails part way through.
pub fn checksum_file(path: &Path) -> io::Result<ContentChecksum> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    let checksum = ContentChecksum(context.compute().0);
    trace!("Checksummed {:?}: {}", path, checksum);
    Ok(checksum)
}

/// Convert a path below `root` into a key
///
/// The root prefix is stripped and the remaining components are joined
/// with `/`, so `root/b/c.txt` becomes `b/c.txt` on every platform.
///
/// # Errors
///
/// - `InvalidInput` if `path` is not below `root`
/// - `InvalidData` if a component is not valid UTF-8
pub fn path_to_key(path: &Path, root: &Path) -> io::Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} is not below {:?}", path, root),
        )
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("path {:?} is not valid UTF-8", path),
                    )
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unexpected path component {:?} in {:?}", other, path),
                ));
            }
        }
    }

    Ok(parts.join("/"))
}

/// Join a key onto a local root, one component per `/` segment
pub fn key_to_path(root: &Path, key: &str) -> std::path::PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Convert a filesystem timestamp to UTC
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
