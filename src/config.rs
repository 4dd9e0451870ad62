//! Account configuration
//!
//! The account file is a small JSON document naming the storage account,
//! its shared key and the container to mirror into:
//!
//! ```json
//! {
//!     "accountName": "mystorage",
//!     "accountKey": "base64-shared-key==",
//!     "containerName": "$web"
//! }
//! ```
//!
//! An optional `"endpoint"` overrides the default
//! `https://<accountName>.blob.core.windows.net` URL, e.g. to point at a
//! local emulator.

use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Credentials and container identity, loaded once at startup
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredentials {
    /// Storage account name
    pub account_name: String,
    account_key: String,
    /// Container to mirror into
    pub container_name: String,
    #[serde(default)]
    endpoint: Option<String>,
}

impl AccountCredentials {
    /// Build credentials directly
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            container_name: container_name.into(),
            endpoint: None,
        }
    }

    /// Override the service endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Load and validate an account file
    ///
    /// # Errors
    ///
    /// [`SyncError::ConfigLoad`] if the file cannot be read, is not valid
    /// JSON, or leaves a required field empty.
    pub fn load(path: &Path) -> Result<Self> {
        let config_err = |source: crate::error::BoxError| SyncError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        };

        let content = std::fs::read_to_string(path).map_err(|e| config_err(e.into()))?;
        let account: AccountCredentials =
            serde_json::from_str(&content).map_err(|e| config_err(e.into()))?;

        for (field, value) in [
            ("accountName", &account.account_name),
            ("accountKey", &account.account_key),
            ("containerName", &account.container_name),
        ] {
            if value.trim().is_empty() {
                return Err(config_err(format!("{} must not be empty", field).into()));
            }
        }

        debug!(
            "Loaded account {} (container {}) from {:?}",
            account.account_name, account.container_name, path
        );
        Ok(account)
    }

    /// Shared key used to sign requests
    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    /// Blob service endpoint for this account
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account_name))
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("container_name", &self.container_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
