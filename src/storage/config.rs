//! Configuration for storage backends

use crate::error::{VaultError, VaultResult};
use crate::storage::drive_client::DriveClient;
use crate::storage::drive_store::{DriveFileStore, DEFAULT_TRASH_FOLDER};
use crate::storage::local_store::LocalFileStore;
use crate::storage::object_client::S3ObjectClient;
use crate::storage::object_store::ObjectFileStore;
use crate::storage::StorageBackend as Backend;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Available storage backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Local,
    CloudDrive,
    ObjectStore,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Ok(StorageBackend::Local),
            "clouddrive" | "cloud-drive" | "drive" | "mega" => Ok(StorageBackend::CloudDrive),
            "objectstore" | "object-store" | "s3" | "r2" => Ok(StorageBackend::ObjectStore),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Hidden folder at the drive root holding quarantined entries
    pub trash_folder: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            trash_folder: DEFAULT_TRASH_FOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Lifetime of signed upload and download URLs
    pub url_expiry_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "auto".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            url_expiry_secs: 900,
        }
    }
}

/// Configuration for file storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the owners' upload directories (local backend)
    pub base_path: String,
    /// Root of the quarantine area (local backend)
    pub trash_path: String,
    pub drive: DriveConfig,
    pub object_store: ObjectStoreConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: "./data/uploads".to_string(),
            trash_path: "./data/trash".to_string(),
            drive: DriveConfig::default(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Create the configured backend. The cloud drive has no bundled SDK, so
    /// its client must be supplied by the caller.
    pub fn create_backend(
        &self,
        drive_client: Option<Arc<dyn DriveClient>>,
    ) -> VaultResult<Arc<dyn Backend>> {
        match self.backend {
            StorageBackend::Local => {
                Ok(Arc::new(LocalFileStore::new(&self.base_path, &self.trash_path)?))
            }
            StorageBackend::CloudDrive => {
                let client = drive_client.ok_or_else(|| {
                    VaultError::invalid("Cloud drive backend selected but no drive client is configured")
                })?;
                info!("Using cloud drive storage, trash folder {}", self.drive.trash_folder);
                Ok(Arc::new(DriveFileStore::new(client, &self.drive.trash_folder)?))
            }
            StorageBackend::ObjectStore => {
                let settings = &self.object_store;
                if settings.bucket.is_empty() {
                    return Err(VaultError::invalid("Object store backend requires a bucket"));
                }
                info!(
                    "Using object storage bucket {} in region {}",
                    settings.bucket, settings.region
                );
                let client = S3ObjectClient::from_settings(
                    &settings.bucket,
                    &settings.region,
                    settings.endpoint.as_deref(),
                    settings.access_key_id.as_deref(),
                    settings.secret_access_key.as_deref(),
                );
                Ok(Arc::new(ObjectFileStore::new(
                    Arc::new(client),
                    Duration::from_secs(settings.url_expiry_secs),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::drive_client::MockDrive;
    use crate::storage::BackendKind;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("LOCAL".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("drive".parse::<StorageBackend>().unwrap(), StorageBackend::CloudDrive);
        assert_eq!("mega".parse::<StorageBackend>().unwrap(), StorageBackend::CloudDrive);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::ObjectStore);
        assert_eq!("R2".parse::<StorageBackend>().unwrap(), StorageBackend::ObjectStore);

        assert!("xfs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, StorageBackend::Local);
        assert_eq!(config.drive.trash_folder, ".trash");
        assert_eq!(config.object_store.url_expiry_secs, 900);
    }

    #[test]
    fn test_create_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = StorageConfig {
            base_path: dir.path().join("up").to_string_lossy().to_string(),
            trash_path: dir.path().join("trash").to_string_lossy().to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(config.create_backend(None).unwrap().kind(), BackendKind::Local);

        config.backend = StorageBackend::CloudDrive;
        assert!(config.create_backend(None).is_err());
        let drive: Arc<dyn DriveClient> = Arc::new(MockDrive::new());
        assert_eq!(
            config.create_backend(Some(drive)).unwrap().kind(),
            BackendKind::CloudDrive
        );

        config.backend = StorageBackend::ObjectStore;
        assert!(config.create_backend(None).is_err());
    }

    #[tokio::test]
    async fn test_create_object_store_backend() {
        let config = StorageConfig {
            backend: StorageBackend::ObjectStore,
            object_store: ObjectStoreConfig {
                bucket: "vault".to_string(),
                endpoint: Some("http://127.0.0.1:9000".to_string()),
                ..ObjectStoreConfig::default()
            },
            ..StorageConfig::default()
        };
        assert_eq!(config.create_backend(None).unwrap().kind(), BackendKind::ObjectStore);
    }
}
