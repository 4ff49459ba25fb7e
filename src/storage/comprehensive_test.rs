//! Contract tests run against every storage backend

use crate::error::VaultError;
use crate::storage::drive_client::MockDrive;
use crate::storage::drive_store::{DriveFileStore, DEFAULT_TRASH_FOLDER};
use crate::storage::local_store::LocalFileStore;
use crate::storage::object_client::MockObjectClient;
use crate::storage::object_store::ObjectFileStore;
use crate::storage::{Download, StorageBackend, TrashEntry};
use bytes::Bytes;
use chrono::DateTime;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A backend under test plus a way to see the bytes behind a locator, since
/// the object store answers downloads with a URL
struct Harness {
    backend: Arc<dyn StorageBackend>,
    objects: Option<Arc<MockObjectClient>>,
    _dir: Option<TempDir>,
}

impl Harness {
    fn local() -> Self {
        let dir = TempDir::new().unwrap();
        let backend = LocalFileStore::new(dir.path().join("uploads"), dir.path().join("trash")).unwrap();
        Self {
            backend: Arc::new(backend),
            objects: None,
            _dir: Some(dir),
        }
    }

    fn drive() -> Self {
        let backend = DriveFileStore::new(Arc::new(MockDrive::new()), DEFAULT_TRASH_FOLDER).unwrap();
        Self {
            backend: Arc::new(backend),
            objects: None,
            _dir: None,
        }
    }

    fn object_store() -> Self {
        let client = Arc::new(MockObjectClient::new());
        let backend = ObjectFileStore::new(client.clone(), Duration::from_secs(60));
        Self {
            backend: Arc::new(backend),
            objects: Some(client),
            _dir: None,
        }
    }

    fn all() -> Vec<Self> {
        vec![Self::local(), Self::drive(), Self::object_store()]
    }

    async fn read(&self, locator: &str) -> Result<Bytes, VaultError> {
        match self.backend.get(locator).await? {
            Download::Bytes(data) => Ok(data),
            Download::Redirect(_) => {
                let objects = self.objects.as_ref().expect("redirect without object client");
                Ok(objects.object(locator).expect("redirect to missing object"))
            }
        }
    }
}

#[tokio::test]
async fn test_put_then_get_returns_same_bytes() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        let payload = Bytes::from(format!("payload for {:?}", kind));
        let stored = harness.backend.put("alice", "a.txt", payload.clone()).await.unwrap();

        assert_eq!(stored.size, payload.len() as u64, "{:?}", kind);
        assert_eq!(harness.read(&stored.locator).await.unwrap(), payload, "{:?}", kind);
    }
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        let stored = harness.backend.put("bob", "gone.bin", Bytes::from_static(b"bye")).await.unwrap();
        harness.backend.delete(&stored.locator).await.unwrap();

        let err = harness.backend.get(&stored.locator).await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);
        assert!(harness.backend.list("bob").await.unwrap().is_empty(), "{:?}", kind);
    }
}

#[tokio::test]
async fn test_list_reflects_completed_puts() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        assert!(harness.backend.list("carol").await.unwrap().is_empty(), "{:?}", kind);

        harness.backend.put("carol", "one.txt", Bytes::from_static(b"1")).await.unwrap();
        harness.backend.put("carol", "two.txt", Bytes::from_static(b"22")).await.unwrap();
        harness.backend.put("carol", "two.txt", Bytes::from_static(b"333")).await.unwrap();
        harness.backend.put("someone", "other.txt", Bytes::from_static(b"x")).await.unwrap();

        let mut listing = harness.backend.list("carol").await.unwrap();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        let summary: Vec<(String, u64)> = listing.into_iter().map(|f| (f.name, f.size)).collect();
        assert_eq!(
            summary,
            vec![("one.txt".to_string(), 1), ("two.txt".to_string(), 3)],
            "{:?}",
            kind
        );
    }
}

#[tokio::test]
async fn test_quarantine_lifecycle() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        let at = DateTime::from_timestamp_millis(1_000).unwrap();
        let kept = harness.backend.put("dan", "keep.txt", Bytes::from_static(b"k")).await.unwrap();
        let trashed = harness.backend.put("dan", "drop.txt", Bytes::from_static(b"d")).await.unwrap();

        let file_entry = TrashEntry::for_file("dan", "drop.txt", at);
        harness.backend.quarantine_file(&trashed.locator, &file_entry).await.unwrap();
        let names: Vec<String> = harness.backend.list("dan").await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["keep.txt".to_string()], "{:?}", kind);
        let err = harness.backend.get(&trashed.locator).await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);
        let err = harness.backend.delete(&trashed.locator).await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);

        // a missing file is never partially moved
        let err = harness
            .backend
            .quarantine_file(&trashed.locator, &file_entry.bumped())
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);

        let account_entry = TrashEntry::for_account("dan", at);
        assert!(harness.backend.quarantine_owner("dan", &account_entry).await.unwrap(), "{:?}", kind);
        assert!(harness.backend.list("dan").await.unwrap().is_empty(), "{:?}", kind);
        let err = harness.backend.get(&kept.locator).await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);
        let err = harness.backend.quarantine_file(&kept.locator, &file_entry.bumped()).await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);

        let mut quarantined = harness.backend.quarantined().await.unwrap();
        quarantined.sort();
        assert_eq!(
            quarantined,
            vec!["dan/drop.txt__1000".to_string(), "dan__1000".to_string()],
            "{:?}",
            kind
        );

        for name in &quarantined {
            harness.backend.purge(name).await.unwrap();
        }
        assert!(harness.backend.quarantined().await.unwrap().is_empty(), "{:?}", kind);
        let err = harness.backend.purge("dan__1000").await.unwrap_err();
        assert!(err.is_not_found(), "{:?}: {:?}", kind, err);
    }
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        for (owner, name) in [("alice", "../x"), ("alice", ".hidden"), ("alice", "user.json"), ("a/b", "x"), ("x__1", "y")] {
            let err = harness.backend.put(owner, name, Bytes::from_static(b"x")).await.unwrap_err();
            assert!(matches!(err, VaultError::InvalidInput(_)), "{:?} {}/{}: {:?}", kind, owner, name, err);
        }
    }
}

#[tokio::test]
async fn test_signed_upload_support() {
    for harness in Harness::all() {
        let kind = harness.backend.kind();
        let result = harness.backend.authorize_put("erin", "movie.mp4", "video/mp4").await;
        match harness.objects {
            Some(_) => assert_eq!(result.unwrap().locator, "erin/movie.mp4"),
            None => assert!(matches!(result, Err(VaultError::InvalidInput(_))), "{:?}", kind),
        }
    }
}
