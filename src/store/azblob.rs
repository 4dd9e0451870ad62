//! Azure Blob Storage backend
//!
//! Built on `opendal`'s `azblob` service. `opendal` is async, while the
//! sync engine is plain blocking code driven by rayon, so the store owns a
//! small multi-threaded tokio runtime and blocks on it for every call.
//! Calls from several executor threads may block on the runtime at once.
//!
//! The listing is consumed through `opendal`'s lister, which follows the
//! service's own continuation tokens; a failure on any underlying page
//! surfaces as an error from [`ObjectStore::list_objects`] and nothing is
//! returned, so the whole listing is reported as one page.

use super::{ObjectListing, ObjectStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::config::AccountCredentials;
use crate::error::{StoreError, StoreResult};
use crate::types::{ContentChecksum, RemoteObjectRecord};
use base64::Engine;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metadata, Metakey, Operator};
use std::time::Duration;
use tracing::{debug, warn};

impl From<opendal::Error> for StoreError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Azure Blob container reached through `opendal`
pub struct AzureBlobStore {
    operator: Operator,
    runtime: tokio::runtime::Runtime,
    name: String,
}

impl AzureBlobStore {
    /// Build a client for the container named in `account`
    ///
    /// No network call is made here; use
    /// [`check_connection`](ObjectStore::check_connection) to validate the
    /// credentials.
    pub fn new(account: &AccountCredentials) -> StoreResult<Self> {
        use opendal::services::Azblob;

        let endpoint = account.endpoint();
        let builder = Azblob::default()
            .container(&account.container_name)
            .endpoint(&endpoint)
            .account_name(&account.account_name)
            .account_key(account.account_key());

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("azsync-io")
            .enable_all()
            .build()?;

        let name = format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            account.container_name
        );

        Ok(Self {
            operator,
            runtime,
            name,
        })
    }
}

/// Decode a base64 `Content-MD5` value as reported by the service
///
/// Blobs committed from blocks have no digest and report an empty value.
fn decode_md5(key: &str, value: &str) -> Option<ContentChecksum> {
    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| ContentChecksum::from_slice(&bytes));
    if decoded.is_none() {
        warn!("Ignoring malformed Content-MD5 {:?} on '{}'", value, key);
    }
    decoded
}

/// Turn one listed entry into a record
///
/// Blobs named like directories (`assets/`) are real objects and are kept.
/// Only the listing root itself is skipped.
fn object_record(path: &str, meta: &Metadata) -> StoreResult<Option<RemoteObjectRecord>> {
    let key = path.trim_start_matches('/');
    if key.is_empty() {
        return Ok(None);
    }

    let last_modified = match meta.last_modified() {
        Some(time) => time,
        // A placeholder never matches a local file, so any time will do
        None if meta.is_dir() => DateTime::<Utc>::UNIX_EPOCH,
        None => {
            return Err(StoreError::backend(format!(
                "'{}' has no last-modified time",
                key
            )))
        }
    };

    Ok(Some(RemoteObjectRecord {
        key: key.to_string(),
        last_modified,
        content_checksum: meta.content_md5().and_then(|value| decode_md5(key, value)),
        size: meta.content_length(),
    }))
}

impl ObjectStore for AzureBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_connection(&self) -> StoreResult<()> {
        self.runtime.block_on(self.operator.check())?;
        Ok(())
    }

    fn list_objects(&self, marker: Option<&str>) -> StoreResult<ObjectListing> {
        if let Some(marker) = marker {
            // Every listing is served as a single page, so no marker is
            // ever handed out.
            return Err(StoreError::backend(format!(
                "unexpected continuation marker {:?}",
                marker
            )));
        }

        let objects = self.runtime.block_on(async {
            let mut lister = self
                .operator
                .lister_with("")
                .recursive(true)
                .metakey(
                    Metakey::Mode
                        | Metakey::ContentLength
                        | Metakey::ContentMd5
                        | Metakey::LastModified,
                )
                .await?;

            let mut objects = Vec::new();
            while let Some(entry) = lister.try_next().await? {
                if let Some(record) = object_record(entry.path(), entry.metadata())? {
                    objects.push(record);
                }
            }
            Ok::<_, StoreError>(objects)
        })?;

        debug!("Listed {} objects from {}", objects.len(), self.name);
        Ok(ObjectListing {
            objects,
            next_marker: None,
        })
    }

    fn put_object(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
        checksum: &ContentChecksum,
    ) -> StoreResult<()> {
        self.runtime.block_on(async {
            self.operator
                .write_with(key, content)
                .content_type(content_type)
                .await?;

            // Single-shot uploads get their Content-MD5 computed by the
            // service; read it back and compare when it is reported.
            let meta = self.operator.stat(key).await?;
            if let Some(stored) = meta
                .content_md5()
                .and_then(|value| decode_md5(key, value))
            {
                if stored != *checksum {
                    return Err(StoreError::ChecksumMismatch {
                        key: key.to_string(),
                        sent: checksum.to_hex(),
                        stored: stored.to_hex(),
                    });
                }
            }
            Ok::<_, StoreError>(())
        })
    }

    fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.runtime.block_on(self.operator.delete(key))?;
        Ok(())
    }
}
