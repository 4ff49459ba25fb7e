//! Mock implementation of AccountStore trait for testing

use crate::error::{VaultError, VaultResult};
use crate::metadata::{Account, AccountStore, OwnerId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// In-memory AccountStore for testing
pub struct MockAccountStore {
    accounts: Arc<Mutex<HashMap<OwnerId, Account>>>,
    quarantine: Arc<Mutex<BTreeMap<String, Account>>>,
}

impl MockAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            quarantine: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Clear all data from the store (useful for test cleanup)
    pub fn clear(&self) {
        self.accounts.lock().unwrap().clear();
        self.quarantine.lock().unwrap().clear();
    }

    /// Get the number of live accounts in the store
    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

impl Default for MockAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MockAccountStore {
    async fn get(&self, owner_id: &str) -> VaultResult<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(owner_id).cloned())
    }

    async fn put(&self, owner_id: &str, account: &Account) -> VaultResult<()> {
        self.accounts
            .lock()
            .unwrap()
            .insert(owner_id.to_string(), account.clone());
        Ok(())
    }

    async fn list_owners(&self) -> VaultResult<Vec<OwnerId>> {
        let mut owners: Vec<OwnerId> = self.accounts.lock().unwrap().keys().cloned().collect();
        owners.sort();
        Ok(owners)
    }

    async fn quarantine(&self, owner_id: &str, entry_name: &str) -> VaultResult<()> {
        let account = self
            .accounts
            .lock()
            .unwrap()
            .remove(owner_id)
            .ok_or_else(|| VaultError::not_found(format!("account {}", owner_id)))?;
        self.quarantine
            .lock()
            .unwrap()
            .insert(entry_name.to_string(), account);
        Ok(())
    }

    async fn quarantined(&self) -> VaultResult<Vec<String>> {
        Ok(self.quarantine.lock().unwrap().keys().cloned().collect())
    }

    async fn purge(&self, entry_name: &str) -> VaultResult<()> {
        self.quarantine
            .lock()
            .unwrap()
            .remove(entry_name)
            .map(|_| ())
            .ok_or_else(|| VaultError::not_found(format!("trash entry {}", entry_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AccountType;

    #[tokio::test]
    async fn test_mock_account_store_basic_operations() {
        let store = MockAccountStore::new();
        assert_eq!(store.account_count(), 0);

        let account = Account::new("dave", AccountType::Standard, Some("pw".into()), None);
        store.put("dave", &account).await.unwrap();
        assert_eq!(store.account_count(), 1);
        assert_eq!(store.get("dave").await.unwrap(), Some(account));

        store.quarantine("dave", "dave__5").await.unwrap();
        assert_eq!(store.account_count(), 0);
        assert_eq!(store.quarantined().await.unwrap(), vec!["dave__5".to_string()]);

        store.purge("dave__5").await.unwrap();
        assert!(store.purge("dave__5").await.is_err());

        store.clear();
        assert!(store.list_owners().await.unwrap().is_empty());
    }
}
