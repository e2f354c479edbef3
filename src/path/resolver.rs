//! Virtual path resolution.
//!
//! Walks a path from the configured root one segment at a time, listing each
//! folder, matching the next name and gating every protected folder on the
//! way. The fingerprint in a segment only breaks ties between same-named
//! siblings; access decisions come from the token service alone.

use std::sync::Arc;

use crate::auth::{AccessTokenService, FolderProtection};
use crate::crypto::{fingerprint, IdentifierCipher};
use crate::lister::DirectoryLister;
use crate::model::{Breadcrumb, BreadcrumbItem, DirectoryEntry, ObjectId, ObjectMeta};
use crate::path::segment::{encode_segment, parse_path, PathSegment};
use crate::{GatewayError, Result};

/// Longest parent chain followed before giving up.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

/// Label used for the root folder in challenges.
pub const ROOT_LABEL: &str = "/";

/// Outcome of resolving a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path names an object the caller may see.
    Resolved {
        /// Real identifier of the terminal object.
        id: ObjectId,
        /// The terminal object.
        entry: DirectoryEntry,
        /// Trail of the walked segments.
        breadcrumb: Breadcrumb,
        /// Whether any folder on the way is protected.
        protected: bool,
    },
    /// A protected folder needs a password first.
    Challenge {
        /// Position of the folder in the path; 0 is the root.
        segment_index: usize,
        /// Display name of the folder.
        folder_label: String,
        /// Encrypted folder identifier to send back with the password.
        folder_token: String,
        /// Trail up to and including the protected folder.
        breadcrumb: Breadcrumb,
    },
}

enum Gate {
    Open,
    Unlocked,
    Locked,
}

/// Resolves virtual paths against the remote tree.
pub struct PathResolver {
    root: ObjectId,
    lister: Arc<DirectoryLister>,
    protection: Arc<FolderProtection>,
    tokens: Arc<AccessTokenService>,
    cipher: Arc<dyn IdentifierCipher>,
}

impl PathResolver {
    pub fn new(
        root: ObjectId,
        lister: Arc<DirectoryLister>,
        protection: Arc<FolderProtection>,
        tokens: Arc<AccessTokenService>,
        cipher: Arc<dyn IdentifierCipher>,
    ) -> Self {
        Self {
            root,
            lister,
            protection,
            tokens,
            cipher,
        }
    }

    /// Configured root folder.
    pub fn root(&self) -> &ObjectId {
        &self.root
    }

    fn root_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            id: self.root.clone(),
            name: String::new(),
            mime_type: "inode/directory".to_string(),
            size: 0,
            modified_time: None,
            is_folder: true,
            extension: None,
            media: None,
        }
    }

    async fn gate(&self, folder: &ObjectId, presented: &[String]) -> Result<Gate> {
        if !self.protection.is_protected(folder).await? {
            return Ok(Gate::Open);
        }
        if self.tokens.authorizes(presented, folder) {
            Ok(Gate::Unlocked)
        } else {
            Ok(Gate::Locked)
        }
    }

    fn challenge(
        &self,
        segment_index: usize,
        folder: &ObjectId,
        label: &str,
        breadcrumb: Breadcrumb,
    ) -> Result<Resolution> {
        tracing::debug!(segment = segment_index, "Protected folder requires a password");
        Ok(Resolution::Challenge {
            segment_index,
            folder_label: label.to_string(),
            folder_token: self.cipher.encrypt(folder.as_str())?,
            breadcrumb,
        })
    }

    /// Pick the child matching `segment`, never the password marker.
    ///
    /// A name that only looks fingerprinted falls back to matching the
    /// whole segment literally.
    fn select<'a>(
        &self,
        entries: &'a [DirectoryEntry],
        segment: &PathSegment,
    ) -> Option<&'a DirectoryEntry> {
        self.pick(entries, &segment.name, segment.fingerprint.as_deref())
            .or_else(|| match segment.fingerprint {
                Some(_) => self.pick(entries, &segment.literal, None),
                None => None,
            })
    }

    fn pick<'a>(
        &self,
        entries: &'a [DirectoryEntry],
        name: &str,
        hint: Option<&str>,
    ) -> Option<&'a DirectoryEntry> {
        let mut candidates = entries
            .iter()
            .filter(|e| e.name == name && !self.protection.is_marker(e));

        let first = candidates.next()?;
        let Some(hint) = hint else {
            return Some(first);
        };
        if fingerprint(first.id.as_str()) == hint {
            return Some(first);
        }
        Some(
            candidates
                .find(|e| fingerprint(e.id.as_str()) == hint)
                .unwrap_or(first),
        )
    }

    /// Resolve `path` with the access tokens the client presented.
    pub async fn resolve(&self, path: &str, presented: &[String]) -> Result<Resolution> {
        let segments = parse_path(path);
        let mut breadcrumb = Breadcrumb::new();
        let mut protected = false;

        match self.gate(&self.root, presented).await? {
            Gate::Locked => return self.challenge(0, &self.root, ROOT_LABEL, breadcrumb),
            Gate::Unlocked => protected = true,
            Gate::Open => {}
        }

        let mut current = self.root_entry();
        for (i, segment) in segments.iter().enumerate() {
            let index = i + 1;
            if !current.is_folder {
                return Err(GatewayError::SegmentNotFound { index });
            }

            let entries = self.lister.list_all(&current.id).await?;
            let next = self
                .select(&entries, segment)
                .cloned()
                .ok_or(GatewayError::SegmentNotFound { index })?;

            breadcrumb.push(BreadcrumbItem {
                label: next.name.clone(),
                segment: encode_segment(&next.name, next.id.as_str()),
            });

            if next.is_folder {
                match self.gate(&next.id, presented).await? {
                    Gate::Locked => return self.challenge(index, &next.id, &next.name, breadcrumb),
                    Gate::Unlocked => protected = true,
                    Gate::Open => {}
                }
            }
            current = next;
        }

        Ok(Resolution::Resolved {
            id: current.id.clone(),
            entry: current,
            breadcrumb,
            protected,
        })
    }

    /// Authorize direct access to `id` by walking its parent links.
    ///
    /// Objects outside the root, markers and over-deep chains are
    /// `NotFound`; any protected ancestor without a valid token is
    /// `Unauthorized`.
    pub async fn check_ancestors(&self, id: &ObjectId, presented: &[String]) -> Result<ObjectMeta> {
        let meta = self.lister.get(id).await?;
        if self.protection.is_marker(&meta.entry) {
            return Err(GatewayError::NotFound("object".to_string()));
        }

        let mut chain = Vec::new();
        if *id == self.root {
            chain.push(self.root.clone());
        } else {
            let mut parent = meta.parent.clone();
            loop {
                let Some(folder) = parent else {
                    tracing::debug!("Object is outside the configured root");
                    return Err(GatewayError::NotFound("object".to_string()));
                };
                if chain.len() >= MAX_ANCESTOR_DEPTH {
                    tracing::warn!("Ancestor chain exceeds maximum depth");
                    return Err(GatewayError::NotFound("object".to_string()));
                }
                chain.push(folder.clone());
                if folder == self.root {
                    break;
                }
                parent = self.lister.get(&folder).await?.parent;
            }
        }

        // Outermost first, matching the order a path walk would check.
        for folder in chain.iter().rev() {
            if let Gate::Locked = self.gate(folder, presented).await? {
                return Err(GatewayError::Unauthorized);
            }
        }
        Ok(meta)
    }
}
