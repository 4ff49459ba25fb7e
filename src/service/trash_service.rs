//! Soft delete and delayed purge
//!
//! Deleted files and accounts are relocated into the backend's quarantine
//! area under a name carrying the move time; a sweep later purges every
//! entry older than the retention window. Nothing is restored in-band.

use crate::error::{VaultError, VaultResult};
use crate::metadata::validate_owner_id;
use crate::service::admin::AdminCapability;
use crate::service::listing_cache::ListingCache;
use crate::service::metadata_service::MetadataService;
use crate::storage::{validate_file_name, StorageBackend, TrashEntry};
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Name collisions stepped around before giving up
const MAX_NAME_ATTEMPTS: usize = 16;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

pub struct TrashService {
    backend: Arc<dyn StorageBackend>,
    metadata: Arc<MetadataService>,
    cache: Arc<ListingCache>,
    retention: Duration,
}

impl TrashService {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        metadata: Arc<MetadataService>,
        cache: Arc<ListingCache>,
        retention: Duration,
    ) -> Self {
        Self {
            backend,
            metadata,
            cache,
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Move one file into quarantine and forget its record
    pub async fn trash_file(
        &self,
        owner_id: &str,
        file_name: &str,
        admin: AdminCapability,
        now: DateTime<Utc>,
    ) -> VaultResult<TrashEntry> {
        admin.require()?;
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let account = self.metadata.require_account(owner_id).await?;

        let tracked = account.files.get(file_name).map(|r| r.locator.clone());
        let locator = match &tracked {
            Some(locator) => locator.clone(),
            None => self
                .backend
                .list(owner_id)
                .await?
                .into_iter()
                .find(|f| f.name == file_name)
                .map(|f| f.locator)
                .ok_or_else(|| VaultError::not_found(format!("File does not exist: {}", file_name)))?,
        };

        let mut entry = TrashEntry::for_file(owner_id, file_name, now);
        let mut attempts = 0;
        loop {
            match self.backend.quarantine_file(&locator, &entry).await {
                Ok(()) => break,
                Err(VaultError::Conflict(_)) if attempts < MAX_NAME_ATTEMPTS => {
                    attempts += 1;
                    entry = entry.bumped();
                }
                Err(e) if e.is_not_found() => {
                    if tracked.is_some() {
                        warn!("Dropping stale record {}/{}: backend has no bytes", owner_id, file_name);
                        if let Err(repair) = self.metadata.remove_file(owner_id, file_name).await {
                            warn!("Failed to drop stale record {}/{}: {}", owner_id, file_name, repair);
                        }
                        self.cache.invalidate(owner_id);
                    }
                    return Err(VaultError::not_found(format!("File does not exist: {}", file_name)));
                }
                Err(e) => return Err(e),
            }
        }

        let removed = self.metadata.remove_file(owner_id, file_name).await;
        self.cache.invalidate(owner_id);
        if let Err(e) = removed {
            error!(
                "Moved {}/{} to trash but the metadata write failed: {}",
                owner_id, file_name, e
            );
            return Err(VaultError::ServerFault(format!("Metadata write failed after trash: {}", e)));
        }

        info!("Trashed {}/{} as {}", owner_id, file_name, entry.name());
        Ok(entry)
    }

    /// Move an account's files and its record into quarantine under one name
    pub async fn trash_account(
        &self,
        owner_id: &str,
        admin: AdminCapability,
        now: DateTime<Utc>,
    ) -> VaultResult<TrashEntry> {
        admin.require()?;
        validate_owner_id(owner_id)?;
        self.metadata.require_account(owner_id).await?;

        let taken: HashSet<String> = self.metadata.store().quarantined().await?.into_iter().collect();
        let mut entry = TrashEntry::for_account(owner_id, now);
        while taken.contains(&entry.name()) {
            entry = entry.bumped();
        }

        let mut attempts = 0;
        let moved = loop {
            match self.backend.quarantine_owner(owner_id, &entry).await {
                Ok(moved) => break moved,
                Err(VaultError::Conflict(_)) if attempts < MAX_NAME_ATTEMPTS => {
                    attempts += 1;
                    entry = entry.bumped();
                }
                Err(e) => return Err(e),
            }
        };

        let quarantined = self.metadata.store().quarantine(owner_id, &entry.name()).await;
        self.cache.invalidate(owner_id);
        if let Err(e) = quarantined {
            error!(
                "Moved storage of {} to trash but quarantining its record failed: {}",
                owner_id, e
            );
            return Err(VaultError::ServerFault(format!("Metadata write failed after trash: {}", e)));
        }

        info!(
            "Trashed account {} as {} (stored files moved: {})",
            owner_id,
            entry.name(),
            moved
        );
        Ok(entry)
    }

    /// Purge every quarantined entry at least `window` old. Returns how many
    /// entries were removed; an entry held by both the backend and the
    /// metadata store counts once.
    pub async fn sweep(
        &self,
        admin: AdminCapability,
        window: Duration,
        now: DateTime<Utc>,
    ) -> VaultResult<usize> {
        admin.require()?;
        if window < Duration::zero() {
            return Err(VaultError::invalid("Retention window cannot be negative"));
        }

        let in_backend: HashSet<String> = self.backend.quarantined().await?.into_iter().collect();
        let in_metadata: HashSet<String> = self.metadata.store().quarantined().await?.into_iter().collect();
        let names: BTreeSet<&String> = in_backend.iter().chain(in_metadata.iter()).collect();

        let mut purged = 0;
        for name in names {
            let Some(entry) = TrashEntry::parse(name) else {
                warn!("Skipping unrecognised trash entry {}", name);
                continue;
            };
            if entry.age(now) < window {
                continue;
            }

            let mut removed = false;
            if in_backend.contains(name) {
                removed |= Self::settle(name, self.backend.purge(name).await);
            }
            if in_metadata.contains(name) {
                removed |= Self::settle(name, self.metadata.store().purge(name).await);
            }
            if removed {
                purged += 1;
            }
        }

        if purged > 0 {
            info!("Purged {} trash entries older than {} days", purged, window.num_days());
        }
        Ok(purged)
    }

    /// Sweep with the configured retention window
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> VaultResult<usize> {
        self.sweep(AdminCapability::Granted, self.retention, now).await
    }

    /// An entry already gone counts as neither success nor failure
    fn settle(name: &str, result: VaultResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                error!("Failed to purge trash entry {}: {}", name, e);
                false
            }
        }
    }
}
