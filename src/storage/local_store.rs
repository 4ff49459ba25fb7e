//! Local filesystem storage implementation
//!
//! Files live at `<base_path>/<owner>/<name>`; the locator is the relative
//! `owner/name` path. Quarantined files go to `<trash_path>/<owner>/<name>__<ms>`
//! and quarantined owners to `<trash_path>/<owner>__<ms>`.

use crate::error::{VaultError, VaultResult};
use crate::metadata::validate_owner_id;
use crate::storage::trash_entry::is_account_entry_name;
use crate::storage::{
    compute_etag, namespaced_key, split_namespaced_key, validate_file_name, BackendKind, Download,
    FileInfo, StorageBackend, StoredFile, TrashEntry,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Local filesystem storage implementation
pub struct LocalFileStore {
    base_path: PathBuf,
    trash_path: PathBuf,
    temp_counter: AtomicU64,
}

impl LocalFileStore {
    pub fn new(base_path: impl Into<PathBuf>, trash_path: impl Into<PathBuf>) -> VaultResult<Self> {
        let base_path = base_path.into();
        let trash_path = trash_path.into();
        for dir in [&base_path, &trash_path] {
            std::fs::create_dir_all(dir).map_err(|e| {
                VaultError::backend(format!("Failed to create directory {}: {}", dir.display(), e))
            })?;
        }
        info!(
            "Using local storage directory: {}, trash directory: {}",
            base_path.display(),
            trash_path.display()
        );
        Ok(Self {
            base_path,
            trash_path,
            temp_counter: AtomicU64::new(0),
        })
    }

    fn file_path(&self, locator: &str) -> VaultResult<PathBuf> {
        let (owner_id, file_name) = split_namespaced_key(locator)?;
        Ok(self.base_path.join(owner_id).join(file_name))
    }

    fn trash_entry_path(&self, entry: &TrashEntry) -> PathBuf {
        match entry.file_name {
            Some(_) => self.trash_path.join(&entry.owner_id).join(entry.leaf_name()),
            None => self.trash_path.join(entry.leaf_name()),
        }
    }

    async fn read_file_info(path: &Path, name: &str, locator: String) -> VaultResult<FileInfo> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| VaultError::from_io(e, &locator))?;
        Ok(FileInfo {
            name: name.to_string(),
            size: meta.len(),
            created_at: modified_at(&meta),
            locator,
        })
    }

    async fn dir_names(dir: &Path) -> VaultResult<Vec<(String, bool)>> {
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
            let Ok(name) = entry.file_name().into_string() else {
                warn!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            names.push((name, is_dir));
        }
        names.sort();
        Ok(names)
    }
}

fn modified_at(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Rename, falling back to copy + remove for plain files on another device
async fn relocate(source: &Path, target: &Path) -> std::io::Result<()> {
    match fs::rename(source, target).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            let is_file = fs::metadata(source).await.map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                return Err(rename_err);
            }
            debug!("Rename of {} failed ({}), copying instead", source.display(), rename_err);
            fs::copy(source, target).await?;
            fs::remove_file(source).await
        }
    }
}

#[async_trait]
impl StorageBackend for LocalFileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn put(&self, owner_id: &str, file_name: &str, data: Bytes) -> VaultResult<StoredFile> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let locator = namespaced_key(owner_id, file_name);

        let owner_dir = self.base_path.join(owner_id);
        fs::create_dir_all(&owner_dir)
            .await
            .map_err(|e| VaultError::from_io(e, owner_id))?;

        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        // temp names stay short so the longest valid file name still fits
        let temp = owner_dir.join(format!(".{}.{}.part", std::process::id(), n));
        let target = owner_dir.join(file_name);

        if let Err(e) = fs::write(&temp, &data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(VaultError::backend(format!("Failed to write {}: {}", locator, e)));
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(VaultError::backend(format!("Failed to store {}: {}", locator, e)));
        }

        let info = Self::read_file_info(&target, file_name, locator.clone()).await?;
        debug!("Stored {} ({} bytes)", locator, info.size);
        Ok(StoredFile {
            locator,
            size: info.size,
            created_at: info.created_at,
            etag: Some(compute_etag(&data)),
            link: None,
        })
    }

    async fn get(&self, locator: &str) -> VaultResult<Download> {
        let path = self.file_path(locator)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| VaultError::from_io(e, locator))?;
        debug!("Read {} ({} bytes)", locator, data.len());
        Ok(Download::Bytes(Bytes::from(data)))
    }

    async fn list(&self, owner_id: &str) -> VaultResult<Vec<FileInfo>> {
        validate_owner_id(owner_id)?;
        let owner_dir = self.base_path.join(owner_id);

        let mut files = Vec::new();
        for (name, is_dir) in Self::dir_names(&owner_dir).await? {
            if is_dir || validate_file_name(&name).is_err() {
                continue;
            }
            let locator = namespaced_key(owner_id, &name);
            match Self::read_file_info(&owner_dir.join(&name), &name, locator).await {
                Ok(info) => files.push(info),
                // removed between readdir and stat
                Err(VaultError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(files)
    }

    async fn delete(&self, locator: &str) -> VaultResult<()> {
        let path = self.file_path(locator)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| VaultError::from_io(e, locator))?;
        debug!("Deleted {}", locator);
        Ok(())
    }

    async fn quarantine_file(&self, locator: &str, entry: &TrashEntry) -> VaultResult<()> {
        let source = self.file_path(locator)?;
        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Err(VaultError::not_found(locator));
        }

        let target = self.trash_entry_path(entry);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(VaultError::Conflict(entry.name()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::from_io(e, &entry.owner_id))?;
        }

        relocate(&source, &target)
            .await
            .map_err(|e| VaultError::from_io(e, locator))?;
        info!("Moved {} to trash as {}", locator, entry.name());
        Ok(())
    }

    async fn quarantine_owner(&self, owner_id: &str, entry: &TrashEntry) -> VaultResult<bool> {
        validate_owner_id(owner_id)?;
        let source = self.base_path.join(owner_id);
        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(false);
        }

        let target = self.trash_entry_path(entry);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(VaultError::Conflict(entry.name()));
        }

        fs::rename(&source, &target)
            .await
            .map_err(|e| VaultError::from_io(e, owner_id))?;
        info!("Moved storage of {} to trash as {}", owner_id, entry.name());
        Ok(true)
    }

    async fn quarantined(&self) -> VaultResult<Vec<String>> {
        let mut names = Vec::new();
        for (name, is_dir) in Self::dir_names(&self.trash_path).await? {
            if is_account_entry_name(&name) {
                names.push(name);
            } else if is_dir {
                for (child, _) in Self::dir_names(&self.trash_path.join(&name)).await? {
                    let full = format!("{}/{}", name, child);
                    if TrashEntry::parse(&full).is_some() {
                        names.push(full);
                    }
                }
            }
        }
        Ok(names)
    }

    async fn purge(&self, entry_name: &str) -> VaultResult<()> {
        let entry = TrashEntry::parse(entry_name)
            .ok_or_else(|| VaultError::invalid(format!("Invalid trash entry: {}", entry_name)))?;
        let path = self.trash_entry_path(&entry);

        let meta = fs::metadata(&path)
            .await
            .map_err(|e| VaultError::from_io(e, entry_name))?;
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        removed.map_err(|e| VaultError::from_io(e, entry_name))?;

        // Drop the owner's trash folder once its last file is gone
        if entry.file_name.is_some() {
            if let Some(parent) = path.parent() {
                if let Err(e) = fs::remove_dir(parent).await {
                    debug!("Keeping trash folder {}: {}", parent.display(), e);
                }
            }
        }

        debug!("Purged trash entry {}", entry_name);
        Ok(())
    }
}
