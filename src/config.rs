//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and
//! environment overrides for deployment.

use crate::metadata::config::{MetadataBackend, MetadataConfig};
use crate::service::listing_cache::DEFAULT_MAX_ENTRIES;
use crate::storage::config::{StorageBackend, StorageConfig};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_LOG_CONFIG_FILE: &str = "server_log.yaml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub cache: CacheConfig,
    pub trash: TrashConfig,
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum upload size in bytes
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: 4,
            max_payload_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Listing cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    /// Owners whose listings are cached at once
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Trash retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashConfig {
    /// Entries older than this many days are purged
    pub retention_days: i64,
    /// Run the background retention worker
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            sweep_enabled: true,
            sweep_interval_secs: 3600,
        }
    }
}

/// Admin access configuration. Without a password every admin route is
/// refused.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub password: Option<String>,
}

/// Log config path from `LOG_CONFIG_FILE` or `server_log.yaml`. Resolved
/// without the YAML config, which is only read once logging is up.
pub fn log_config_path() -> String {
    env_string("LOG_CONFIG_FILE").unwrap_or_else(|| DEFAULT_LOG_CONFIG_FILE.to_string())
}

impl AppConfig {
    /// Load configuration from `CONFIG_FILE` or `config.yaml`, use defaults if
    /// not found, then apply environment overrides
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a YAML file, use defaults if it does not exist
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Environment variables win over the file
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_string("UPLOADS_DIR") {
            self.storage.base_path = dir;
        }
        if let Some(dir) = env_string("TRASH_DIR") {
            self.storage.trash_path = dir;
        }
        if let Some(dir) = env_string("METADATA_DIR") {
            self.metadata.base_path = dir;
        }
        if let Some(backend) = env_parsed::<StorageBackend>("STORAGE_BACKEND") {
            self.storage.backend = backend;
        }
        if let Some(backend) = env_parsed::<MetadataBackend>("METADATA_BACKEND") {
            self.metadata.backend = backend;
        }
        if let Some(ttl) = env_parsed::<u64>("CACHE_TTL_MS") {
            self.cache.ttl_ms = ttl;
        }
        if let Some(days) = env_parsed::<i64>("TRASH_RETENTION_DAYS") {
            self.trash.retention_days = days;
        }
        if let Some(password) = env_string("ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
        if let Some(port) = env_parsed::<u16>("PORT") {
            self.server.port = port;
        }

        let object_store = &mut self.storage.object_store;
        if let Some(bucket) = env_string("S3_BUCKET") {
            object_store.bucket = bucket;
        }
        if let Some(region) = env_string("S3_REGION") {
            object_store.region = region;
        }
        if let Some(endpoint) = env_string("S3_ENDPOINT") {
            object_store.endpoint = Some(endpoint);
        }
        if let Some(key) = env_string("S3_ACCESS_KEY_ID") {
            object_store.access_key_id = Some(key);
        }
        if let Some(secret) = env_string("S3_SECRET_ACCESS_KEY") {
            object_store.secret_access_key = Some(secret);
        }
        if let Some(expiry) = env_parsed::<u64>("S3_URL_EXPIRY_SECS") {
            object_store.url_expiry_secs = expiry;
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(value) => {
            info!("Using {} from environment", name);
            Some(value)
        }
        Err(e) => {
            warn!("Ignoring invalid {} in environment ({}): {}", name, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const OVERRIDES: &[&str] = &[
        "UPLOADS_DIR",
        "TRASH_DIR",
        "METADATA_DIR",
        "STORAGE_BACKEND",
        "METADATA_BACKEND",
        "CACHE_TTL_MS",
        "TRASH_RETENTION_DAYS",
        "ADMIN_PASSWORD",
        "PORT",
        "S3_BUCKET",
        "S3_ENDPOINT",
        "LOG_CONFIG_FILE",
    ];

    fn clear_env() {
        for name in OVERRIDES {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.ttl_ms, 10_000);
        assert_eq!(config.cache.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.trash.retention_days, 30);
        assert!(config.admin.password.is_none());
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.metadata.backend, MetadataBackend::Json);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "server:\n  port: 8081\nstorage:\n  backend: ObjectStore\n  object_store:\n    bucket: files\ncache:\n  ttl_ms: 500\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.storage.backend, StorageBackend::ObjectStore);
        assert_eq!(config.storage.object_store.bucket, "files");
        assert_eq!(config.storage.object_store.url_expiry_secs, 900);
        assert_eq!(config.cache.ttl_ms, 500);
        assert_eq!(config.trash.retention_days, 30);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/config.yaml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("UPLOADS_DIR", "/srv/uploads");
        env::set_var("STORAGE_BACKEND", "s3");
        env::set_var("CACHE_TTL_MS", "250");
        env::set_var("ADMIN_PASSWORD", "hunter2");
        env::set_var("S3_BUCKET", "vault");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.storage.base_path, "/srv/uploads");
        assert_eq!(config.storage.backend, StorageBackend::ObjectStore);
        assert_eq!(config.cache.ttl_ms, 250);
        assert_eq!(config.admin.password.as_deref(), Some("hunter2"));
        assert_eq!(config.storage.object_store.bucket, "vault");
    }

    #[test]
    #[serial]
    fn test_log_config_path_needs_no_config_file() {
        clear_env();
        assert_eq!(log_config_path(), DEFAULT_LOG_CONFIG_FILE);

        env::set_var("LOG_CONFIG_FILE", "/etc/vault/log.yaml");
        let path = log_config_path();
        clear_env();
        assert_eq!(path, "/etc/vault/log.yaml");
    }

    #[test]
    #[serial]
    fn test_invalid_env_values_are_ignored() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        env::set_var("METADATA_BACKEND", "sqlite");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.metadata.backend, MetadataBackend::Json);
    }
}
