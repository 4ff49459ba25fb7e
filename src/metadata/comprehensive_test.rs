//! Contract tests run against every AccountStore implementation

use crate::metadata::json_store::JsonAccountStore;
use crate::metadata::mock_store::MockAccountStore;
use crate::metadata::{Account, AccountStatus, AccountStore, AccountType, FileRecord};
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

async fn check_store_contract(store: &dyn AccountStore) {
    assert!(store.get("erin").await.unwrap().is_none());

    let mut account = Account::new("erin", AccountType::ApprovalRequired, Some("pw".into()), Some("4321".into()));
    store.put("erin", &account).await.unwrap();

    account.status = AccountStatus::Active;
    account.files.insert(
        "notes.txt".to_string(),
        FileRecord {
            locator: "erin/notes.txt".to_string(),
            size: 11,
            created_at: Utc::now(),
            last_signed_at: None,
            etag: None,
            link: None,
        },
    );
    store.put("erin", &account).await.unwrap();

    let loaded = store.get("erin").await.unwrap().unwrap();
    assert_eq!(loaded.status, AccountStatus::Active);
    assert_eq!(loaded.files.len(), 1);
    assert_eq!(loaded.files["notes.txt"].locator, "erin/notes.txt");

    let frank = Account::new("frank", AccountType::Anonymous, None, None);
    store.put("frank", &frank).await.unwrap();
    assert_eq!(
        store.list_owners().await.unwrap(),
        vec!["erin".to_string(), "frank".to_string()]
    );

    store.quarantine("erin", "erin__42").await.unwrap();
    assert!(store.get("erin").await.unwrap().is_none());
    assert_eq!(store.quarantined().await.unwrap(), vec!["erin__42".to_string()]);
    store.purge("erin__42").await.unwrap();
    assert!(store.quarantined().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_json_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = JsonAccountStore::new(dir.path()).unwrap();
    check_store_contract(&store).await;
}

#[tokio::test]
async fn test_mock_store_contract() {
    let store = MockAccountStore::new();
    check_store_contract(&store).await;
}

#[tokio::test]
async fn test_json_store_different_owners_write_concurrently() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonAccountStore::new(dir.path()).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("user{}", i);
            let account = Account::new(&id, AccountType::Standard, Some("pw".into()), None);
            store.put(&id, &account).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.list_owners().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_json_store_same_owner_writers_never_expose_partial_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonAccountStore::new(dir.path()).unwrap());
    let account = Account::new("gina", AccountType::Standard, Some("pw".into()), None);
    store.put("gina", &account).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut account = Account::new("gina", AccountType::Standard, Some(format!("pw{}", i)), None);
            account.files.insert(
                format!("f{}.bin", i),
                FileRecord {
                    locator: format!("gina/f{}.bin", i),
                    size: i as u64,
                    created_at: Utc::now(),
                    last_signed_at: None,
                    etag: None,
                    link: None,
                },
            );
            store.put("gina", &account).await.unwrap();
            assert!(store.get("gina").await.unwrap().is_some());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let last = store.get("gina").await.unwrap().unwrap();
    assert_eq!(last.files.len(), 1);
}
