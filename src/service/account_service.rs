//! Registration, login and admin moderation of accounts

use crate::error::{VaultError, VaultResult};
use crate::metadata::{validate_owner_id, Account, AccountStatus, AccountSummary, AccountType};
use crate::service::admin::AdminCapability;
use crate::service::listing_cache::ListingCache;
use crate::service::metadata_service::MetadataService;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;

const VERIFICATION_CODE_LEN: usize = 4;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub account_type: Option<String>,
    pub verification_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct AccountService {
    metadata: Arc<MetadataService>,
    cache: Arc<ListingCache>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(metadata: Arc<MetadataService>, cache: Arc<ListingCache>) -> Self {
        Self { metadata, cache }
    }

    /// Create an account. Every check runs before anything is written, and an
    /// existing account is never touched.
    pub async fn register(&self, registration: &Registration) -> VaultResult<AccountSummary> {
        let username = present(&registration.username).ok_or_else(|| VaultError::invalid("Missing username"))?;
        validate_owner_id(username)?;
        let account_type = match present(&registration.account_type) {
            Some(raw) => raw.parse::<AccountType>()?,
            None => AccountType::Standard,
        };

        if self.metadata.find_account(username).await?.is_some() {
            warn!("Registration of existing user {}", username);
            return Err(VaultError::Conflict("User already exists".to_string()));
        }

        let password = present(&registration.password);
        if account_type != AccountType::Anonymous && password.is_none() {
            return Err(VaultError::invalid("Missing password"));
        }
        let code = present(&registration.verification_code);
        if account_type == AccountType::ApprovalRequired
            && code.map(|c| c.chars().count()) != Some(VERIFICATION_CODE_LEN)
        {
            return Err(VaultError::invalid("Invalid verification code"));
        }

        let account = Account::new(
            username,
            account_type,
            password.map(str::to_string),
            code.map(str::to_string),
        );
        self.metadata.save(&account).await?;
        self.cache.invalidate(username);

        info!("Registered {:?} account {}", account_type, username);
        Ok(account.summary())
    }

    pub async fn login(&self, credentials: &Credentials) -> VaultResult<AccountSummary> {
        let username = present(&credentials.username).ok_or_else(|| VaultError::invalid("Missing username"))?;
        validate_owner_id(username)?;
        let account = self.metadata.require_account(username).await?;

        if !account.credential_matches(present(&credentials.password)) {
            warn!("Failed login for {}", username);
            return Err(VaultError::forbidden("Invalid password"));
        }
        if account.is_awaiting_approval() {
            return Err(VaultError::forbidden("Account not approved"));
        }

        info!("User {} logged in", username);
        Ok(account.summary())
    }

    pub async fn approve(&self, username: &str, admin: AdminCapability) -> VaultResult<AccountSummary> {
        admin.require()?;
        validate_owner_id(username)?;
        let mut account = self.metadata.require_account(username).await?;
        if account.account_type != AccountType::ApprovalRequired {
            return Err(VaultError::invalid("This account does not require approval"));
        }

        account.status = AccountStatus::Active;
        self.metadata.save(&account).await?;
        info!("Approved account {}", username);
        Ok(account.summary())
    }

    pub async fn list_accounts(&self, admin: AdminCapability) -> VaultResult<Vec<AccountSummary>> {
        admin.require()?;
        Ok(self
            .metadata
            .all_accounts()
            .await?
            .iter()
            .map(Account::summary)
            .collect())
    }

    pub async fn pending_accounts(&self, admin: AdminCapability) -> VaultResult<Vec<AccountSummary>> {
        admin.require()?;
        Ok(self
            .metadata
            .all_accounts()
            .await?
            .iter()
            .filter(|a| a.is_awaiting_approval())
            .map(Account::summary)
            .collect())
    }
}
