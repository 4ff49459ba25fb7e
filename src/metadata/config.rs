//! Configuration for metadata storage backends

use crate::error::VaultResult;
use crate::metadata::{json_store::JsonAccountStore, mock_store::MockAccountStore, AccountStore};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available metadata storage backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MetadataBackend {
    #[default]
    Json,
    Mock,
}

impl std::str::FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "file" | "local" => Ok(MetadataBackend::Json),
            "mock" | "memory" => Ok(MetadataBackend::Mock),
            _ => Err(format!("Unknown metadata backend: {}", s)),
        }
    }
}

/// Configuration for metadata storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// Directory holding one record per account
    pub base_path: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            base_path: "./data/accounts".to_string(),
        }
    }
}

impl MetadataConfig {
    /// Create a metadata storage instance based on the configuration
    pub fn create_store(&self) -> VaultResult<Arc<dyn AccountStore>> {
        match self.backend {
            MetadataBackend::Json => {
                info!("Creating JSON account store at {}", self.base_path);
                Ok(Arc::new(JsonAccountStore::new(&self.base_path)?))
            }
            MetadataBackend::Mock => {
                info!("Creating mock account store");
                Ok(Arc::new(MockAccountStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_backend_from_str() {
        assert_eq!("json".parse::<MetadataBackend>().unwrap(), MetadataBackend::Json);
        assert_eq!("FILE".parse::<MetadataBackend>().unwrap(), MetadataBackend::Json);
        assert_eq!("mock".parse::<MetadataBackend>().unwrap(), MetadataBackend::Mock);
        assert_eq!("Memory".parse::<MetadataBackend>().unwrap(), MetadataBackend::Mock);

        assert!("sqlite".parse::<MetadataBackend>().is_err());
    }

    #[test]
    fn test_metadata_config_default() {
        let config = MetadataConfig::default();
        assert_eq!(config.backend, MetadataBackend::Json);
    }

    #[tokio::test]
    async fn test_create_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = MetadataConfig {
            backend: MetadataBackend::Json,
            base_path: dir.path().to_string_lossy().to_string(),
        };
        let store = config.create_store().unwrap();
        assert!(store.list_owners().await.unwrap().is_empty());

        let config = MetadataConfig {
            backend: MetadataBackend::Mock,
            base_path: String::new(),
        };
        let store = config.create_store().unwrap();
        assert!(store.list_owners().await.unwrap().is_empty());
    }
}
