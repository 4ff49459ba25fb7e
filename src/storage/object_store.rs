//! S3-compatible object storage implementation
//!
//! Objects are keyed `<owner>/<name>`. Downloads are answered with a
//! time-limited signed URL, and uploads may be handed to the client as a
//! signed PUT. Quarantined files live under `.trash/<owner>/<name>__<ms>` and
//! quarantined owners under the `.trash/<owner>__<ms>/` prefix.

use crate::error::{VaultError, VaultResult};
use crate::metadata::validate_owner_id;
use crate::storage::object_client::ObjectClient;
use crate::storage::trash_entry::is_account_entry_name;
use crate::storage::{
    compute_etag, detect_content_type, namespaced_key, split_namespaced_key, validate_file_name,
    BackendKind, Download, FileInfo, StorageBackend, StoredFile, TrashEntry, UploadAuthorization,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub const TRASH_PREFIX: &str = ".trash/";

pub struct ObjectFileStore {
    client: Arc<dyn ObjectClient>,
    url_expiry: Duration,
}

impl ObjectFileStore {
    pub fn new(client: Arc<dyn ObjectClient>, url_expiry: Duration) -> Self {
        Self { client, url_expiry }
    }

    fn trash_key(entry: &TrashEntry) -> String {
        format!("{}{}", TRASH_PREFIX, entry.name())
    }

    fn owner_prefix(owner_id: &str) -> String {
        format!("{}/", owner_id)
    }

    async fn require_object(&self, locator: &str) -> VaultResult<()> {
        match self.client.head_object(locator).await? {
            Some(_) => Ok(()),
            None => Err(VaultError::not_found(locator)),
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectFileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn put(&self, owner_id: &str, file_name: &str, data: Bytes) -> VaultResult<StoredFile> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let key = namespaced_key(owner_id, file_name);
        let size = data.len() as u64;
        let computed = compute_etag(&data);

        let etag = self
            .client
            .put_object(&key, data, detect_content_type(file_name))
            .await?;
        debug!("Stored object {} ({} bytes)", key, size);
        Ok(StoredFile {
            locator: key,
            size,
            created_at: Utc::now(),
            etag: Some(etag.unwrap_or(computed)),
            link: None,
        })
    }

    async fn authorize_put(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
    ) -> VaultResult<UploadAuthorization> {
        validate_owner_id(owner_id)?;
        validate_file_name(file_name)?;
        let key = namespaced_key(owner_id, file_name);
        let issued_at = Utc::now();
        let url = self
            .client
            .presign_put(&key, content_type, self.url_expiry)
            .await?;
        let expiry = chrono::Duration::from_std(self.url_expiry)
            .map_err(|e| VaultError::invalid(format!("Invalid URL expiry: {}", e)))?;
        debug!("Issued signed upload for {}", key);
        Ok(UploadAuthorization {
            url,
            locator: key,
            expires_at: issued_at + expiry,
        })
    }

    async fn get(&self, locator: &str) -> VaultResult<Download> {
        split_namespaced_key(locator)?;
        self.require_object(locator).await?;
        let url = self.client.presign_get(locator, self.url_expiry).await?;
        Ok(Download::Redirect(url))
    }

    async fn list(&self, owner_id: &str) -> VaultResult<Vec<FileInfo>> {
        validate_owner_id(owner_id)?;
        let prefix = Self::owner_prefix(owner_id);
        let mut files = Vec::new();
        for object in self.client.list_objects(&prefix).await? {
            let Some(name) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            if validate_file_name(name).is_err() {
                continue;
            }
            files.push(FileInfo {
                name: name.to_string(),
                size: object.size,
                created_at: object.last_modified,
                locator: object.key.clone(),
            });
        }
        Ok(files)
    }

    async fn delete(&self, locator: &str) -> VaultResult<()> {
        split_namespaced_key(locator)?;
        self.require_object(locator).await?;
        self.client.delete_object(locator).await?;
        debug!("Deleted object {}", locator);
        Ok(())
    }

    async fn quarantine_file(&self, locator: &str, entry: &TrashEntry) -> VaultResult<()> {
        split_namespaced_key(locator)?;
        self.require_object(locator).await?;

        let target = Self::trash_key(entry);
        if self.client.head_object(&target).await?.is_some() {
            return Err(VaultError::Conflict(entry.name()));
        }

        self.client.copy_object(locator, &target).await?;
        self.client.delete_object(locator).await?;
        info!("Moved object {} to trash as {}", locator, entry.name());
        Ok(())
    }

    async fn quarantine_owner(&self, owner_id: &str, entry: &TrashEntry) -> VaultResult<bool> {
        validate_owner_id(owner_id)?;
        let prefix = Self::owner_prefix(owner_id);
        let objects = self.client.list_objects(&prefix).await?;
        if objects.is_empty() {
            return Ok(false);
        }

        let target_prefix = format!("{}/", Self::trash_key(entry));
        if !self.client.list_objects(&target_prefix).await?.is_empty() {
            return Err(VaultError::Conflict(entry.name()));
        }

        // copy everything first so a failure leaves the originals in place
        for object in &objects {
            let rest = object.key.strip_prefix(&prefix).unwrap_or(&object.key);
            self.client
                .copy_object(&object.key, &format!("{}{}", target_prefix, rest))
                .await?;
        }
        for object in &objects {
            self.client.delete_object(&object.key).await?;
        }
        info!(
            "Moved {} objects of {} to trash as {}",
            objects.len(),
            owner_id,
            entry.name()
        );
        Ok(true)
    }

    async fn quarantined(&self) -> VaultResult<Vec<String>> {
        let mut names = BTreeSet::new();
        for object in self.client.list_objects(TRASH_PREFIX).await? {
            let Some(rest) = object.key.strip_prefix(TRASH_PREFIX) else {
                continue;
            };
            let first = rest.split('/').next().unwrap_or(rest);
            if rest.contains('/') && is_account_entry_name(first) {
                names.insert(first.to_string());
            } else if TrashEntry::parse(rest).is_some() {
                names.insert(rest.to_string());
            } else {
                warn!("Ignoring unrecognised trash object {}", object.key);
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn purge(&self, entry_name: &str) -> VaultResult<()> {
        let entry = TrashEntry::parse(entry_name)
            .ok_or_else(|| VaultError::invalid(format!("Invalid trash entry: {}", entry_name)))?;
        let key = Self::trash_key(&entry);

        if entry.is_account() {
            let objects = self.client.list_objects(&format!("{}/", key)).await?;
            if objects.is_empty() {
                return Err(VaultError::not_found(entry_name));
            }
            for object in objects {
                self.client.delete_object(&object.key).await?;
            }
        } else {
            self.require_object(&key)
                .await
                .map_err(|_| VaultError::not_found(entry_name))?;
            self.client.delete_object(&key).await?;
        }
        debug!("Purged object trash entry {}", entry_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_client::MockObjectClient;
    use chrono::DateTime;

    fn store() -> (Arc<MockObjectClient>, ObjectFileStore) {
        let client = Arc::new(MockObjectClient::new());
        let store = ObjectFileStore::new(client.clone(), Duration::from_secs(900));
        (client, store)
    }

    #[tokio::test]
    async fn test_download_is_signed_redirect() {
        let (_client, store) = store();
        let stored = store.put("alice", "pic.png", Bytes::from_static(b"png")).await.unwrap();
        assert_eq!(stored.locator, "alice/pic.png");
        assert_eq!(stored.etag.as_deref(), Some(compute_etag(b"png").as_str()));

        match store.get("alice/pic.png").await.unwrap() {
            Download::Redirect(url) => assert!(url.contains("alice/pic.png")),
            other => panic!("expected redirect, got {:?}", other),
        }
        assert!(store.get("alice/missing.png").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_signed_upload_appears_after_transfer() {
        let (client, store) = store();
        let auth = store.authorize_put("bob", "v.mp4", "video/mp4").await.unwrap();
        assert_eq!(auth.locator, "bob/v.mp4");
        assert!(auth.expires_at > Utc::now());
        assert!(store.list("bob").await.unwrap().is_empty());

        client.complete_upload(&auth.locator, Bytes::from_static(b"video"));
        let listing = store.list("bob").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].size, 5);
    }

    #[tokio::test]
    async fn test_listing_ignores_nested_keys_and_other_owners() {
        let (client, store) = store();
        client.complete_upload("carol/a.txt", Bytes::from_static(b"a"));
        client.complete_upload("carol/deep/b.txt", Bytes::from_static(b"b"));
        client.complete_upload("carolyn/c.txt", Bytes::from_static(b"c"));

        let names: Vec<String> = store.list("carol").await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_quarantine_and_purge() {
        let (client, store) = store();
        store.put("dan", "1.txt", Bytes::from_static(b"1")).await.unwrap();
        store.put("dan", "2.txt", Bytes::from_static(b"2")).await.unwrap();
        let at = DateTime::from_timestamp_millis(500).unwrap();

        let file_entry = TrashEntry::for_file("dan", "1.txt", at);
        store.quarantine_file("dan/1.txt", &file_entry).await.unwrap();
        let err = store.quarantine_file("dan/1.txt", &file_entry).await.unwrap_err();
        assert!(err.is_not_found());

        let owner_entry = TrashEntry::for_account("dan", at);
        assert!(store.quarantine_owner("dan", &owner_entry).await.unwrap());
        assert!(store.list("dan").await.unwrap().is_empty());
        assert_eq!(
            store.quarantined().await.unwrap(),
            vec!["dan/1.txt__500".to_string(), "dan__500".to_string()]
        );

        store.purge("dan__500").await.unwrap();
        store.purge("dan/1.txt__500").await.unwrap();
        assert!(store.quarantined().await.unwrap().is_empty());
        assert_eq!(client.object_count(), 0);
        assert!(store.purge("dan__500").await.unwrap_err().is_not_found());
    }
}
