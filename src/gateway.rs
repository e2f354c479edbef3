//! The gateway facade.
//!
//! Wires cipher, lister, protection lookup, token service, resolver and relay
//! together and exposes the operations the HTTP layer calls.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AccessTokenService, CredentialHasher, FolderProtection};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::crypto::{CipherError, IdentifierCipher, SivCipher};
use crate::lister::DirectoryLister;
use crate::model::{DirectoryEntry, ObjectId};
use crate::path::{PathResolver, Resolution};
use crate::relay::{parse_range_header, RelayedBody, StreamingRelay};
use crate::retry::RetryPolicy;
use crate::store::RemoteStore;
use crate::{GatewayError, Result};

/// Marks sealed cursors so they never open as object identifiers.
const CURSOR_PURPOSE: &str = "cursor\n";

/// Separates the folder from the upstream cursor inside a sealed cursor.
const CURSOR_SEPARATOR: char = '\n';

/// One page of a folder as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPage {
    /// Visible children, marker excluded.
    pub entries: Vec<DirectoryEntry>,
    /// Sealed cursor for the next page.
    pub next_cursor: Option<String>,
}

/// Successful unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocked {
    /// Sealed access token for the folder.
    pub access_token: String,
    /// Token lifetime.
    pub expires_in: Duration,
}

/// A file ready to be streamed.
pub struct FileStream {
    /// The file being sent.
    pub entry: DirectoryEntry,
    /// Relayed content.
    pub body: RelayedBody,
}

/// Secure path and streaming gateway.
pub struct Gateway {
    cipher: Arc<dyn IdentifierCipher>,
    lister: Arc<DirectoryLister>,
    protection: Arc<FolderProtection>,
    tokens: Arc<AccessTokenService>,
    resolver: PathResolver,
    relay: StreamingRelay,
}

impl Gateway {
    /// Build a gateway with the production identifier cipher.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn RemoteStore>,
        cache: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self> {
        let cipher = SivCipher::new(config.security.identifier_secret.as_bytes())
            .map_err(|e| GatewayError::Config(format!("identifier cipher: {}", e)))?;
        Self::with_cipher(config, store, cache, Arc::new(cipher))
    }

    /// Build a gateway around an explicit identifier cipher.
    pub fn with_cipher(
        config: &Config,
        store: Arc<dyn RemoteStore>,
        cache: Option<Arc<dyn CacheStore>>,
        cipher: Arc<dyn IdentifierCipher>,
    ) -> Result<Self> {
        let retry = RetryPolicy::from_config(&config.upstream);
        let cache = cache.filter(|_| config.cache.enabled);

        let lister = Arc::new(DirectoryLister::new(
            store.clone(),
            cache,
            Duration::from_secs(config.cache.ttl_secs),
            retry,
        ));

        let hasher = CredentialHasher::new(&config.security.hasher)
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        let protection = Arc::new(FolderProtection::new(
            lister.clone(),
            Arc::new(hasher),
            config.security.password_marker.clone(),
        ));

        let tokens = Arc::new(AccessTokenService::new(
            config.security.token_secret.as_bytes(),
            Duration::from_secs(config.security.token_ttl_secs),
        )?);

        let resolver = PathResolver::new(
            ObjectId::new(config.upstream.root_id.clone()),
            lister.clone(),
            protection.clone(),
            tokens.clone(),
            cipher.clone(),
        );
        let relay = StreamingRelay::new(store, retry, &config.relay);

        Ok(Self {
            cipher,
            lister,
            protection,
            tokens,
            resolver,
            relay,
        })
    }

    /// Access token service.
    pub fn tokens(&self) -> &AccessTokenService {
        &self.tokens
    }

    /// Seal an identifier for use in a URL.
    pub fn seal_id(&self, id: &ObjectId) -> Result<String> {
        Ok(self.cipher.encrypt(id.as_str())?)
    }

    /// Open an identifier sealed by [`seal_id`](Self::seal_id).
    pub fn open_id(&self, token: &str) -> Result<ObjectId> {
        let plain = self.cipher.decrypt(token)?;
        if plain.starts_with(CURSOR_PURPOSE) {
            return Err(CipherError::Authentication.into());
        }
        Ok(ObjectId::new(plain))
    }

    /// Resolve a virtual path.
    pub async fn resolve(&self, path: &str, presented: &[String]) -> Result<Resolution> {
        self.resolver.resolve(path, presented).await
    }

    fn open_cursor(&self, folder: &ObjectId, cursor: &str) -> Result<String> {
        let invalid = || GatewayError::BadRequest("invalid cursor".to_string());
        let plain = self.cipher.decrypt(cursor).map_err(|_| invalid())?;
        let body = plain.strip_prefix(CURSOR_PURPOSE).ok_or_else(invalid)?;
        let (owner, token) = body.split_once(CURSOR_SEPARATOR).ok_or_else(invalid)?;
        if owner != folder.as_str() || token.is_empty() {
            return Err(invalid());
        }
        Ok(token.to_string())
    }

    fn seal_cursor(&self, folder: &ObjectId, token: &str) -> Result<String> {
        let plain = format!(
            "{}{}{}{}",
            CURSOR_PURPOSE,
            folder.as_str(),
            CURSOR_SEPARATOR,
            token
        );
        Ok(self.cipher.encrypt(&plain)?)
    }

    /// One page of an already authorized folder.
    ///
    /// Cursors are sealed and bound to their folder, so they reveal nothing
    /// and cannot be replayed against another folder.
    pub async fn list_page(&self, folder: &ObjectId, cursor: Option<&str>) -> Result<FolderPage> {
        let page_token = cursor.map(|c| self.open_cursor(folder, c)).transpose()?;
        let page = self.lister.list(folder, page_token.as_deref()).await?;

        let next_cursor = page
            .next_page_token
            .as_deref()
            .map(|t| self.seal_cursor(folder, t))
            .transpose()?;
        let entries = page
            .entries
            .into_iter()
            .filter(|e| !self.protection.is_marker(e))
            .collect();

        Ok(FolderPage {
            entries,
            next_cursor,
        })
    }

    /// Exchange a folder password for an access token.
    ///
    /// Every failure looks the same to the caller: unknown or tampered
    /// folder tokens, unprotected folders and wrong passwords all cost one
    /// hash verification and end in `InvalidPassword`.
    pub async fn unlock(&self, folder_token: &str, password: &str) -> Result<Unlocked> {
        let Ok(folder) = self.open_id(folder_token) else {
            self.protection.burn(password).await?;
            return Err(GatewayError::InvalidPassword);
        };

        let verified = match self.protection.verify_password(&folder, password).await {
            Ok(verified) => verified,
            Err(GatewayError::NotFound(_)) => {
                self.protection.burn(password).await?;
                false
            }
            Err(e) => return Err(e),
        };

        if !verified {
            tracing::debug!("Unlock attempt rejected");
            return Err(GatewayError::InvalidPassword);
        }

        tracing::info!("Protected folder unlocked");
        Ok(Unlocked {
            access_token: self.tokens.issue_default(&folder)?,
            expires_in: self.tokens.default_ttl(),
        })
    }

    /// Authorize and open a file by its sealed identifier.
    pub async fn open_stream(
        &self,
        file_token: &str,
        presented: &[String],
        range_header: Option<&str>,
    ) -> Result<FileStream> {
        let id = self.open_id(file_token)?;
        let range = range_header.map(parse_range_header).transpose()?;

        let meta = self.resolver.check_ancestors(&id, presented).await?;
        if meta.entry.is_folder {
            return Err(GatewayError::NotFound("file".to_string()));
        }

        let body = self.relay.open(&id, meta.entry.size, range).await?;
        Ok(FileStream {
            entry: meta.entry,
            body,
        })
    }
}
