//! Metadata service layer over the AccountStore trait

use crate::error::{VaultError, VaultResult};
use crate::metadata::{Account, AccountStore, FileRecord, OwnerId};
use log::{error, warn};
use std::sync::Arc;

/// Account lookups and record edits shared by the other services
pub struct MetadataService {
    store: Arc<dyn AccountStore>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub async fn find_account(&self, owner_id: &str) -> VaultResult<Option<Account>> {
        self.store.get(owner_id).await
    }

    /// The owner's record, or `NotFound`
    pub async fn require_account(&self, owner_id: &str) -> VaultResult<Account> {
        self.store
            .get(owner_id)
            .await?
            .ok_or_else(|| VaultError::not_found(format!("User does not exist: {}", owner_id)))
    }

    /// Like `require_account`, and the account must not be waiting for approval
    pub async fn require_usable_account(&self, owner_id: &str) -> VaultResult<Account> {
        let account = self.require_account(owner_id).await?;
        if !account.is_usable() {
            warn!("Rejected operation for unapproved account {}", owner_id);
            return Err(VaultError::forbidden("Account not approved"));
        }
        Ok(account)
    }

    pub async fn save(&self, account: &Account) -> VaultResult<()> {
        self.store.put(&account.id, account).await
    }

    /// Persist a record change that follows a completed backend operation.
    /// Failing here leaves the backend ahead of the metadata.
    pub async fn save_after_backend(&self, account: &Account, what: &str) -> VaultResult<()> {
        self.store.put(&account.id, account).await.map_err(|e| {
            error!(
                "Backend {} for {} succeeded but the metadata write failed: {}",
                what, account.id, e
            );
            VaultError::ServerFault(format!("Metadata write failed after {}: {}", what, e))
        })
    }

    /// Drop one file record; returns the removed record
    pub async fn remove_file(&self, owner_id: &str, file_name: &str) -> VaultResult<Option<FileRecord>> {
        let Some(mut account) = self.store.get(owner_id).await? else {
            return Ok(None);
        };
        let removed = account.files.remove(file_name);
        if removed.is_some() {
            self.store.put(owner_id, &account).await?;
        }
        Ok(removed)
    }

    pub async fn list_owners(&self) -> VaultResult<Vec<OwnerId>> {
        self.store.list_owners().await
    }

    /// Every readable account, in owner order
    pub async fn all_accounts(&self) -> VaultResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for owner_id in self.store.list_owners().await? {
            match self.store.get(&owner_id).await? {
                Some(account) => accounts.push(account),
                None => warn!("Skipping unreadable account record {}", owner_id),
            }
        }
        Ok(accounts)
    }
}
