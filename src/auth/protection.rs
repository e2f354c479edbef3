//! Per-folder password lookup.
//!
//! A folder is protected when it directly contains the hidden marker object.
//! The marker holds either a plaintext password or a precomputed Argon2
//! digest. Digests are cached per folder and re-derived whenever the marker
//! object changes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::auth::password::{is_digest, CredentialHasher};
use crate::lister::DirectoryLister;
use crate::model::{DirectoryEntry, ObjectId};
use crate::{GatewayError, Result};

/// Largest marker object read, in bytes.
pub const MAX_MARKER_BYTES: usize = 1024;

/// Hashed password of one protected folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecord {
    /// Argon2 PHC digest; empty when the marker holds nothing usable.
    pub digest: String,
    /// Identity of the marker revision the digest came from.
    pub version: String,
}

fn marker_version(marker: &DirectoryEntry) -> String {
    let modified = marker
        .modified_time
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    format!("{}:{}:{}", marker.id, modified, marker.size)
}

/// Resolves and checks folder passwords.
pub struct FolderProtection {
    lister: Arc<DirectoryLister>,
    hasher: Arc<CredentialHasher>,
    marker_name: String,
    records: RwLock<HashMap<ObjectId, PasswordRecord>>,
}

impl FolderProtection {
    /// Create a lookup using `marker_name` as the hidden marker object.
    pub fn new(
        lister: Arc<DirectoryLister>,
        hasher: Arc<CredentialHasher>,
        marker_name: impl Into<String>,
    ) -> Self {
        Self {
            lister,
            hasher,
            marker_name: marker_name.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the marker object.
    pub fn marker_name(&self) -> &str {
        &self.marker_name
    }

    /// Whether `entry` is a password marker and must stay invisible.
    pub fn is_marker(&self, entry: &DirectoryEntry) -> bool {
        !entry.is_folder && entry.name == self.marker_name
    }

    fn cached(&self, folder: &ObjectId, version: &str) -> Option<PasswordRecord> {
        let records = self.records.read().ok()?;
        records.get(folder).filter(|r| r.version == version).cloned()
    }

    fn remember(&self, folder: &ObjectId, record: Option<&PasswordRecord>) {
        if let Ok(mut records) = self.records.write() {
            match record {
                Some(record) => {
                    records.insert(folder.clone(), record.clone());
                }
                None => {
                    records.remove(folder);
                }
            }
        }
    }

    /// Password record of `folder`, or `None` when it is not protected.
    pub async fn record_for(&self, folder: &ObjectId) -> Result<Option<PasswordRecord>> {
        let entries = self.lister.list_all(folder).await?;
        let Some(marker) = entries.iter().find(|e| self.is_marker(e)) else {
            self.remember(folder, None);
            return Ok(None);
        };

        let version = marker_version(marker);
        if let Some(record) = self.cached(folder, &version) {
            return Ok(Some(record));
        }

        let raw = self.lister.read_small(&marker.id, MAX_MARKER_BYTES).await?;
        let content = String::from_utf8_lossy(&raw).trim().to_string();

        let digest = if content.is_empty() {
            tracing::warn!(folder = %folder, "Password marker is empty; folder stays locked");
            String::new()
        } else if is_digest(&content) {
            content
        } else {
            let hasher = self.hasher.clone();
            tokio::task::spawn_blocking(move || hasher.hash(&content))
                .await
                .map_err(|e| GatewayError::Internal(format!("hash task failed: {}", e)))?
                .unwrap_or_else(|e| {
                    tracing::warn!(folder = %folder, error = %e, "Unusable password marker; folder stays locked");
                    String::new()
                })
        };

        tracing::debug!(folder = %folder, "Password record refreshed");
        let record = PasswordRecord { digest, version };
        self.remember(folder, Some(&record));
        Ok(Some(record))
    }

    /// Whether `folder` contains a password marker.
    pub async fn is_protected(&self, folder: &ObjectId) -> Result<bool> {
        Ok(self.record_for(folder).await?.is_some())
    }

    /// Check `password` against `folder`'s record.
    ///
    /// Unprotected folders answer `false` after the same hashing work.
    pub async fn verify_password(&self, folder: &ObjectId, password: &str) -> Result<bool> {
        let record = self.record_for(folder).await?;
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || match record {
            Some(record) => hasher.verify(&password, &record.digest),
            None => {
                hasher.burn(&password);
                false
            }
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("verify task failed: {}", e)))
    }

    /// Spend one verification's worth of work.
    pub async fn burn(&self, password: &str) -> Result<()> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.burn(&password))
            .await
            .map_err(|e| GatewayError::Internal(format!("verify task failed: {}", e)))
    }
}
