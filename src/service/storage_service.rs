//! Storage service layer: file operations on one owner's namespace
//!
//! Every operation resolves the owner's record first, then talks to the
//! backend chosen at startup, then updates the record. Anything that changes
//! what an owner stores invalidates that owner's cached listing.

use crate::error::{VaultError, VaultResult};
use crate::metadata::{validate_owner_id, Account, FileRecord};
use crate::service::access_policy::{can_view, Access};
use crate::service::listing_cache::{CacheLookup, ListingCache};
use crate::service::metadata_service::MetadataService;
use crate::service::user_context::UserContext;
use crate::storage::{
    validate_file_name, Download, FileInfo, StorageBackend, UploadAuthorization,
};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    metadata: Arc<MetadataService>,
    cache: Arc<ListingCache>,
    /// How long a signed-but-unconfirmed upload keeps its record
    upload_grace: Duration,
}

impl StorageService {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        metadata: Arc<MetadataService>,
        cache: Arc<ListingCache>,
        upload_grace: Duration,
    ) -> Self {
        Self {
            backend,
            metadata,
            cache,
            upload_grace,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Store bytes for an existing, usable account, replacing a file of the
    /// same name
    pub async fn upload(&self, owner_id: &str, file_name: &str, data: Bytes) -> VaultResult<FileRecord> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let mut account = self.metadata.require_usable_account(owner_id).await?;

        let size = data.len();
        let stored = self.backend.put(owner_id, file_name, data).await?;
        let record = FileRecord::from(stored);
        account.files.insert(file_name.to_string(), record.clone());

        let saved = self.metadata.save_after_backend(&account, "upload").await;
        self.cache.invalidate(owner_id);
        saved?;

        info!("Uploaded {}/{} ({} bytes)", owner_id, file_name, size);
        Ok(record)
    }

    /// Issue a signed upload URL and record the file before the client has
    /// transferred anything
    pub async fn authorize_upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
    ) -> VaultResult<UploadAuthorization> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        if content_type.trim().is_empty() {
            return Err(VaultError::invalid("Missing filename or contentType"));
        }
        let mut account = self.metadata.require_usable_account(owner_id).await?;

        let authorization = self
            .backend
            .authorize_put(owner_id, file_name, content_type)
            .await?;
        let now = Utc::now();
        account.files.insert(
            file_name.to_string(),
            FileRecord {
                locator: authorization.locator.clone(),
                size: 0,
                created_at: now,
                last_signed_at: Some(now),
                etag: None,
                link: None,
            },
        );

        let saved = self.metadata.save_after_backend(&account, "upload authorization").await;
        self.cache.invalidate(owner_id);
        saved?;

        debug!("Authorized signed upload of {}/{}", owner_id, file_name);
        Ok(authorization)
    }

    /// Fetch a file. A record whose bytes are gone is dropped on the way out.
    pub async fn download(&self, owner_id: &str, file_name: &str) -> VaultResult<Download> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let account = self.metadata.require_account(owner_id).await?;
        let record = account
            .files
            .get(file_name)
            .ok_or_else(|| VaultError::not_found(format!("File does not exist: {}", file_name)))?;

        match self.backend.get(&record.locator).await {
            Ok(download) => Ok(download),
            Err(e) if e.is_not_found() => {
                warn!("Dropping stale record {}/{}: backend has no bytes", owner_id, file_name);
                if let Err(repair) = self.metadata.remove_file(owner_id, file_name).await {
                    warn!("Failed to drop stale record {}/{}: {}", owner_id, file_name, repair);
                }
                self.cache.invalidate(owner_id);
                Err(VaultError::not_found(format!("File does not exist: {}", file_name)))
            }
            Err(e) => Err(e),
        }
    }

    /// List an owner's files for a viewer. The owner must exist (404) before
    /// the viewer is judged (403); only then are cache and backend consulted.
    pub async fn list_files(&self, context: &UserContext) -> VaultResult<Vec<FileInfo>> {
        let owner_id = context.owner_id.as_str();
        validate_owner_id(owner_id)?;
        let mut owner = self.metadata.require_account(owner_id).await?;

        let viewer = match context.viewer_id.as_deref() {
            _ if context.is_owner_viewing() => None,
            Some(viewer_id) if validate_owner_id(viewer_id).is_ok() => {
                self.metadata.find_account(viewer_id).await?
            }
            _ => None,
        };
        if let Access::Deny(reason) = can_view(context.viewer_id.as_deref(), owner_id, viewer.as_ref()) {
            warn!(
                "Listing of {} denied for viewer {:?} from {}",
                owner_id,
                context.viewer_id,
                context.get_metadata("peer").map(String::as_str).unwrap_or("unknown")
            );
            return Err(VaultError::forbidden(reason));
        }

        let ticket = match self.cache.lookup(owner_id, Instant::now()) {
            CacheLookup::Hit(files) => {
                debug!("Listing cache hit for {}", owner_id);
                return Ok(files);
            }
            CacheLookup::Miss(ticket) => ticket,
        };

        let mut files = self.backend.list(owner_id).await?;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        if reconcile(&mut owner, &files, Utc::now(), self.upload_grace) {
            // the listing below already reflects the repaired record
            if let Err(e) = self.metadata.save(&owner).await {
                warn!("Failed to save reconciled record for {}: {}", owner_id, e);
            }
        }

        self.cache.store(ticket, files.clone(), Instant::now());
        Ok(files)
    }
}

/// Bring an owner's file records in line with a live backend listing.
/// Records without bytes are dropped unless a signed upload is still within
/// its grace window; files missing a record are adopted. Returns whether the
/// record changed.
pub fn reconcile(account: &mut Account, listing: &[FileInfo], now: DateTime<Utc>, grace: Duration) -> bool {
    let live: HashMap<&str, &FileInfo> = listing.iter().map(|f| (f.name.as_str(), f)).collect();
    let mut changed = false;

    account.files.retain(|name, record| {
        if live.contains_key(name.as_str()) {
            return true;
        }
        let signing = record.is_awaiting_transfer()
            && record.last_signed_at.map(|at| now - at < grace).unwrap_or(false);
        if !signing {
            debug!("Dropping record {} ({}) with no stored bytes", name, record.locator);
            changed = true;
        }
        signing
    });

    for info in listing {
        match account.files.get_mut(&info.name) {
            Some(record) => {
                if record.size != info.size || record.locator != info.locator {
                    record.size = info.size;
                    record.locator = info.locator.clone();
                    record.created_at = info.created_at;
                    changed = true;
                }
            }
            None => {
                debug!("Adopting untracked file {}", info.locator);
                account.files.insert(
                    info.name.clone(),
                    FileRecord {
                        locator: info.locator.clone(),
                        size: info.size,
                        created_at: info.created_at,
                        last_signed_at: None,
                        etag: None,
                        link: None,
                    },
                );
                changed = true;
            }
        }
    }
    changed
}
