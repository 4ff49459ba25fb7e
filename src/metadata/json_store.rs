//! JSON-file implementation of AccountStore
//!
//! Layout: `<root>/<owner>.json`, quarantined records under
//! `<root>/.trash/<entry>.json`. Writes go to a dot-prefixed temp file in the
//! same directory and are renamed over the live record.

use crate::error::{VaultError, VaultResult};
use crate::metadata::{validate_owner_id, Account, AccountStore, OwnerId};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const RECORD_EXTENSION: &str = "json";
const QUARANTINE_DIR: &str = ".trash";

/// JSON-file implementation of AccountStore
pub struct JsonAccountStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl JsonAccountStore {
    /// Create the store, making sure the root and quarantine directories exist
    pub fn new(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(QUARANTINE_DIR))
            .map_err(|e| VaultError::backend(format!("Failed to create metadata directory {}: {}", root.display(), e)))?;
        info!("Using metadata directory: {}", root.display());
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, owner_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", owner_id, RECORD_EXTENSION))
    }

    fn quarantine_path(&self, entry_name: &str) -> PathBuf {
        self.root
            .join(QUARANTINE_DIR)
            .join(format!("{}.{}", entry_name, RECORD_EXTENSION))
    }

    fn temp_path(&self, owner_id: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{}.tmp", owner_id, std::process::id(), n))
    }

    async fn record_names(dir: &Path) -> VaultResult<Vec<String>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::from_io(e, &dir.display().to_string())),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VaultError::from_io(e, &dir.display().to_string()))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(stem) = file_name.strip_suffix(&format!(".{}", RECORD_EXTENSION)) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn get(&self, owner_id: &str) -> VaultResult<Option<Account>> {
        if validate_owner_id(owner_id).is_err() {
            return Ok(None);
        }
        let path = self.record_path(owner_id);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Failed to read account record {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        match serde_json::from_str::<Account>(&text) {
            Ok(account) => Ok(Some(account)),
            Err(e) => {
                warn!("Ignoring corrupt account record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn put(&self, owner_id: &str, account: &Account) -> VaultResult<()> {
        validate_owner_id(owner_id)?;
        let body = serde_json::to_vec_pretty(account)
            .map_err(|e| VaultError::ServerFault(format!("Failed to encode account {}: {}", owner_id, e)))?;

        let temp = self.temp_path(owner_id);
        let target = self.record_path(owner_id);
        if let Err(e) = fs::write(&temp, &body).await {
            let _ = fs::remove_file(&temp).await;
            return Err(VaultError::backend(format!("Failed to write {}: {}", temp.display(), e)));
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(VaultError::backend(format!("Failed to replace {}: {}", target.display(), e)));
        }

        debug!("Wrote account record for {} ({} bytes)", owner_id, body.len());
        Ok(())
    }

    async fn list_owners(&self) -> VaultResult<Vec<OwnerId>> {
        Self::record_names(&self.root).await
    }

    async fn quarantine(&self, owner_id: &str, entry_name: &str) -> VaultResult<()> {
        validate_owner_id(owner_id)?;
        let source = self.record_path(owner_id);
        let target = self.quarantine_path(entry_name);
        fs::create_dir_all(self.root.join(QUARANTINE_DIR))
            .await
            .map_err(|e| VaultError::from_io(e, QUARANTINE_DIR))?;
        fs::rename(&source, &target)
            .await
            .map_err(|e| VaultError::from_io(e, &format!("account {}", owner_id)))?;
        info!("Moved account record {} to quarantine as {}", owner_id, entry_name);
        Ok(())
    }

    async fn quarantined(&self) -> VaultResult<Vec<String>> {
        Self::record_names(&self.root.join(QUARANTINE_DIR)).await
    }

    async fn purge(&self, entry_name: &str) -> VaultResult<()> {
        if entry_name.contains('/') || entry_name.contains('\\') || entry_name.starts_with('.') {
            return Err(VaultError::invalid(format!("Invalid trash entry: {}", entry_name)));
        }
        let path = self.quarantine_path(entry_name);
        fs::remove_file(&path)
            .await
            .map_err(|e| VaultError::from_io(e, &format!("trash entry {}", entry_name)))?;
        debug!("Purged quarantined account record {}", entry_name);
        Ok(())
    }
}
