//! Cloud-drive storage implementation
//!
//! Each owner gets a folder at the drive root; the locator of a file is its
//! node handle. The quarantine area is a dedicated folder at the root whose
//! name starts with a dot, so it can never collide with an owner folder.

use crate::error::{VaultError, VaultResult};
use crate::metadata::validate_owner_id;
use crate::storage::drive_client::{DriveClient, DriveNode};
use crate::storage::trash_entry::is_account_entry_name;
use crate::storage::{
    compute_etag, validate_file_name, BackendKind, Download, FileInfo, StorageBackend, StoredFile,
    TrashEntry,
};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_TRASH_FOLDER: &str = ".trash";

/// Cloud-drive storage implementation
pub struct DriveFileStore {
    client: Arc<dyn DriveClient>,
    trash_folder: String,
}

impl DriveFileStore {
    pub fn new(client: Arc<dyn DriveClient>, trash_folder: &str) -> VaultResult<Self> {
        if !trash_folder.starts_with('.') || trash_folder.contains('/') {
            return Err(VaultError::invalid(format!(
                "Drive trash folder must be a single dot-prefixed name: {}",
                trash_folder
            )));
        }
        Ok(Self {
            client,
            trash_folder: trash_folder.to_string(),
        })
    }

    /// Store using the `.trash` folder at the drive root
    pub fn with_default_trash(client: Arc<dyn DriveClient>) -> Self {
        Self {
            client,
            trash_folder: DEFAULT_TRASH_FOLDER.to_string(),
        }
    }

    async fn find_folder(&self, parent: Option<&str>, name: &str) -> VaultResult<Option<DriveNode>> {
        Ok(self
            .client
            .children(parent)
            .await?
            .into_iter()
            .find(|n| n.is_folder && n.name == name))
    }

    async fn ensure_folder(&self, parent: Option<&str>, name: &str) -> VaultResult<DriveNode> {
        match self.find_folder(parent, name).await? {
            Some(folder) => Ok(folder),
            None => {
                debug!("Creating drive folder {}", name);
                self.client.create_folder(parent, name).await
            }
        }
    }

    async fn trash_root(&self, create: bool) -> VaultResult<Option<DriveNode>> {
        if create {
            self.ensure_folder(None, &self.trash_folder).await.map(Some)
        } else {
            self.find_folder(None, &self.trash_folder).await
        }
    }

    /// Resolve a locator to a file that still sits in an owner folder at the
    /// drive root. Handles survive moves, so a trashed node must not resolve.
    /// Returns the owner id.
    async fn live_file(&self, locator: &str) -> VaultResult<String> {
        let gone = || VaultError::not_found(locator);
        let node = self.client.node(locator).await?;
        if node.is_folder {
            return Err(gone());
        }
        let parent = node.parent.as_deref().ok_or_else(gone)?;
        let folder = self.client.node(parent).await?;
        if !folder.is_folder || folder.parent.is_some() || folder.name == self.trash_folder {
            return Err(gone());
        }
        validate_owner_id(&folder.name).map_err(|_| gone())?;
        Ok(folder.name)
    }

    /// Resolve a quarantine entry name to its drive node
    async fn find_trash_node(&self, entry: &TrashEntry) -> VaultResult<Option<DriveNode>> {
        let Some(root) = self.trash_root(false).await? else {
            return Ok(None);
        };
        let parent = match entry.file_name {
            Some(_) => match self.find_folder(Some(&root.handle), &entry.owner_id).await? {
                Some(folder) => folder,
                None => return Ok(None),
            },
            None => root,
        };
        let leaf = entry.leaf_name();
        Ok(self
            .client
            .children(Some(&parent.handle))
            .await?
            .into_iter()
            .find(|n| n.name == leaf))
    }
}

#[async_trait]
impl StorageBackend for DriveFileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudDrive
    }

    async fn put(&self, owner_id: &str, file_name: &str, data: Bytes) -> VaultResult<StoredFile> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;

        let folder = self.ensure_folder(None, owner_id).await?;
        let previous: Vec<DriveNode> = self
            .client
            .children(Some(&folder.handle))
            .await?
            .into_iter()
            .filter(|n| !n.is_folder && n.name == file_name)
            .collect();

        let etag = compute_etag(&data);
        let node = self.client.upload(&folder.handle, file_name, data).await?;
        // the link is only requested once the upload has completed
        let link = self.client.export_link(&node.handle).await?;

        for old in previous {
            if let Err(e) = self.client.delete(&old.handle).await {
                warn!("Failed to remove replaced drive node {} for {}/{}: {}", old.handle, owner_id, file_name, e);
            }
        }

        info!("Uploaded {}/{} to drive node {}", owner_id, file_name, node.handle);
        Ok(StoredFile {
            locator: node.handle,
            size: node.size,
            created_at: node.created_at,
            etag: Some(etag),
            link: Some(link),
        })
    }

    async fn get(&self, locator: &str) -> VaultResult<Download> {
        self.live_file(locator).await?;
        let data = self.client.download(locator).await?;
        Ok(Download::Bytes(data))
    }

    async fn list(&self, owner_id: &str) -> VaultResult<Vec<FileInfo>> {
        validate_owner_id(owner_id)?;
        let Some(folder) = self.find_folder(None, owner_id).await? else {
            return Ok(Vec::new());
        };
        // a replaced node whose removal failed shares its name with the new
        // one; the newest wins
        let mut newest: BTreeMap<String, DriveNode> = BTreeMap::new();
        for node in self.client.children(Some(&folder.handle)).await? {
            if node.is_folder {
                continue;
            }
            match newest.get(&node.name) {
                Some(kept) if kept.created_at > node.created_at => {}
                _ => {
                    newest.insert(node.name.clone(), node);
                }
            }
        }
        Ok(newest
            .into_values()
            .map(|n| FileInfo {
                name: n.name,
                size: n.size,
                created_at: n.created_at,
                locator: n.handle,
            })
            .collect())
    }

    async fn delete(&self, locator: &str) -> VaultResult<()> {
        self.live_file(locator).await?;
        self.client.delete(locator).await?;
        debug!("Deleted drive node {}", locator);
        Ok(())
    }

    async fn quarantine_file(&self, locator: &str, entry: &TrashEntry) -> VaultResult<()> {
        let owner_id = self.live_file(locator).await?;
        if owner_id != entry.owner_id {
            return Err(VaultError::not_found(locator));
        }

        let root = self.trash_root(true).await?.ok_or_else(|| {
            VaultError::ServerFault("Drive trash folder could not be created".to_string())
        })?;
        let owner_folder = self.ensure_folder(Some(&root.handle), &entry.owner_id).await?;

        let leaf = entry.leaf_name();
        let taken = self
            .client
            .children(Some(&owner_folder.handle))
            .await?
            .iter()
            .any(|n| n.name == leaf);
        if taken {
            return Err(VaultError::Conflict(entry.name()));
        }

        self.client
            .move_node(locator, Some(&owner_folder.handle), &leaf)
            .await?;
        info!("Moved drive node {} to trash as {}", locator, entry.name());
        Ok(())
    }

    async fn quarantine_owner(&self, owner_id: &str, entry: &TrashEntry) -> VaultResult<bool> {
        validate_owner_id(owner_id)?;
        let Some(folder) = self.find_folder(None, owner_id).await? else {
            return Ok(false);
        };
        let root = self.trash_root(true).await?.ok_or_else(|| {
            VaultError::ServerFault("Drive trash folder could not be created".to_string())
        })?;
        if self.find_trash_node(entry).await?.is_some() {
            return Err(VaultError::Conflict(entry.name()));
        }

        self.client
            .move_node(&folder.handle, Some(&root.handle), &entry.leaf_name())
            .await?;
        info!("Moved drive folder of {} to trash as {}", owner_id, entry.name());
        Ok(true)
    }

    async fn quarantined(&self) -> VaultResult<Vec<String>> {
        let Some(root) = self.trash_root(false).await? else {
            return Ok(Vec::new());
        };
        let mut names = Vec::new();
        for node in self.client.children(Some(&root.handle)).await? {
            if is_account_entry_name(&node.name) {
                names.push(node.name);
            } else if node.is_folder {
                for child in self.client.children(Some(&node.handle)).await? {
                    let full = format!("{}/{}", node.name, child.name);
                    if TrashEntry::parse(&full).is_some() {
                        names.push(full);
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn purge(&self, entry_name: &str) -> VaultResult<()> {
        let entry = TrashEntry::parse(entry_name)
            .ok_or_else(|| VaultError::invalid(format!("Invalid trash entry: {}", entry_name)))?;
        let node = self
            .find_trash_node(&entry)
            .await?
            .ok_or_else(|| VaultError::not_found(entry_name))?;
        self.client.delete(&node.handle).await?;
        debug!("Purged drive trash entry {}", entry_name);
        Ok(())
    }
}
