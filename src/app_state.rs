//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.
//! The backend, store and cache are chosen once here and shared by every
//! request; nothing is held in globals.

use chrono::Duration;
use log::info;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::VaultResult;
use crate::metadata::mock_store::MockAccountStore;
use crate::metadata::AccountStore;
use crate::service::account_service::AccountService;
use crate::service::admin::AdminCapability;
use crate::service::listing_cache::ListingCache;
use crate::service::metadata_service::MetadataService;
use crate::service::retention_worker::RetentionWorker;
use crate::service::storage_service::StorageService;
use crate::service::trash_service::TrashService;
use crate::storage::drive_client::{DriveClient, MockDrive};
use crate::storage::drive_store::DriveFileStore;
use crate::storage::StorageBackend;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub storage_service: Arc<StorageService>,
    pub metadata_service: Arc<MetadataService>,
    pub account_service: Arc<AccountService>,
    pub trash_service: Arc<TrashService>,
    pub cache: Arc<ListingCache>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> VaultResult<Self> {
        Self::from_config_with_drive(config, None)
    }

    /// Like `from_config`, with the client the cloud-drive backend talks to
    pub fn from_config_with_drive(
        config: AppConfig,
        drive_client: Option<Arc<dyn DriveClient>>,
    ) -> VaultResult<Self> {
        info!("Initializing application state with configuration");
        let backend = config.storage.create_backend(drive_client)?;
        let store = config.metadata.create_store()?;
        info!(
            "Using {:?} storage backend and {:?} metadata backend",
            config.storage.backend, config.metadata.backend
        );
        Ok(Self::with_parts(config, backend, store))
    }

    /// Wire services around an already built backend and store
    pub fn with_parts(
        config: AppConfig,
        backend: Arc<dyn StorageBackend>,
        store: Arc<dyn AccountStore>,
    ) -> Self {
        let cache = Arc::new(ListingCache::with_capacity(
            std::time::Duration::from_millis(config.cache.ttl_ms),
            config.cache.max_entries,
        ));
        let metadata_service = Arc::new(MetadataService::new(store));
        let upload_grace = i64::try_from(config.storage.object_store.url_expiry_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        let storage_service = Arc::new(StorageService::new(
            backend.clone(),
            metadata_service.clone(),
            cache.clone(),
            upload_grace,
        ));
        let trash_service = Arc::new(TrashService::new(
            backend,
            metadata_service.clone(),
            cache.clone(),
            Duration::try_days(config.trash.retention_days).unwrap_or(Duration::MAX),
        ));
        let account_service = Arc::new(AccountService::new(metadata_service.clone(), cache.clone()));

        info!("Application state initialized successfully");
        Self {
            storage_service,
            metadata_service,
            account_service,
            trash_service,
            cache,
            config,
        }
    }

    /// Create application state for testing with in-memory backends
    pub fn new_for_testing() -> Self {
        let mut config = AppConfig::default();
        config.admin.password = Some("test-admin".to_string());
        config.trash.sweep_enabled = false;

        let backend: Arc<dyn StorageBackend> =
            Arc::new(DriveFileStore::with_default_trash(Arc::new(MockDrive::new())));
        Self::with_parts(config, backend, Arc::new(MockAccountStore::new()))
    }

    /// Admin capability for a presented password
    pub fn admin_capability(&self, presented: Option<&str>) -> AdminCapability {
        AdminCapability::from_password(self.config.admin.password.as_deref(), presented)
    }

    /// Background sweeper, when enabled in configuration
    pub fn retention_worker(&self) -> Option<RetentionWorker> {
        if !self.config.trash.sweep_enabled {
            return None;
        }
        Some(RetentionWorker::new(
            self.trash_service.clone(),
            std::time::Duration::from_secs(self.config.trash.sweep_interval_secs.max(1)),
        ))
    }
}
