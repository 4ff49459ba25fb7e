//! Metadata Storage Layer Abstraction
//!
//! One durable record per owner: the account state the storage core needs to
//! enforce access rules, plus the map of file names to backend locators.
//! Implementations must replace a record atomically; a half-written record
//! must never be observable.

pub mod config;
pub mod json_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{VaultError, VaultResult};

/// Separator between an original name and its move timestamp in trash entries.
pub const TRASH_SEPARATOR: &str = "__";

const MAX_OWNER_ID_LEN: usize = 128;

/// User identifier type
pub type OwnerId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccountType {
    #[default]
    Standard,
    Anonymous,
    ApprovalRequired,
}

impl std::str::FromStr for AccountType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(AccountType::Standard),
            "anonymous" => Ok(AccountType::Anonymous),
            "approval-required" | "approval_required" => Ok(AccountType::ApprovalRequired),
            _ => Err(VaultError::invalid(format!("Unknown account type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Pending,
}

/// Where the bytes of one file live and what the backend reported about them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Backend-specific reference: relative path, drive node handle or object key
    pub locator: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// Last time an upload URL was issued for this file (object store only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Public link exported by the cloud drive once the upload completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl FileRecord {
    /// True while the record was only signed for and the transfer is unconfirmed
    pub fn is_awaiting_transfer(&self) -> bool {
        self.last_signed_at.is_some() && self.size == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: OwnerId,
    pub account_type: AccountType,
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub files: HashMap<String, FileRecord>,
}

impl Account {
    /// Build a fresh account; anonymous accounts never keep a credential and
    /// approval-required accounts start out pending.
    pub fn new(
        id: &str,
        account_type: AccountType,
        credential: Option<String>,
        verification_code: Option<String>,
    ) -> Self {
        let status = match account_type {
            AccountType::ApprovalRequired => AccountStatus::Pending,
            _ => AccountStatus::Active,
        };
        let credential = match account_type {
            AccountType::Anonymous => None,
            _ => credential,
        };
        let verification_code = match account_type {
            AccountType::ApprovalRequired => verification_code,
            _ => None,
        };
        Self {
            id: id.to_string(),
            account_type,
            status,
            credential,
            verification_code,
            created_at: Utc::now(),
            files: HashMap::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.account_type == AccountType::Anonymous
    }

    /// An approval-required account cannot be used until an admin approves it
    pub fn is_usable(&self) -> bool {
        !(self.account_type == AccountType::ApprovalRequired
            && self.status == AccountStatus::Pending)
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.account_type == AccountType::ApprovalRequired && self.status == AccountStatus::Pending
    }

    /// Anonymous accounts log in without a credential
    pub fn credential_matches(&self, presented: Option<&str>) -> bool {
        if self.is_anonymous() {
            return true;
        }
        match (&self.credential, presented) {
            (Some(expected), Some(presented)) => expected == presented,
            _ => false,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            account_type: self.account_type,
            status: self.status,
            file_count: self.files.len(),
        }
    }
}

/// Account fields safe to hand back to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: OwnerId,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub file_count: usize,
}

/// Check that an owner id can be used as a namespace in every backend
pub fn validate_owner_id(id: &str) -> VaultResult<()> {
    if id.is_empty() {
        return Err(VaultError::invalid("Missing user id"));
    }
    if id.len() > MAX_OWNER_ID_LEN {
        return Err(VaultError::invalid("User id is too long"));
    }
    if id.starts_with('.')
        || id.contains('/')
        || id.contains('\\')
        || id.contains(TRASH_SEPARATOR)
        || id.chars().any(char::is_control)
    {
        return Err(VaultError::invalid(format!("Invalid user id: {}", id)));
    }
    Ok(())
}

/// Trait defining the metadata storage interface
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an owner's record. Missing and unreadable records are both `None`.
    async fn get(&self, owner_id: &str) -> VaultResult<Option<Account>>;

    /// Atomically replace an owner's record
    async fn put(&self, owner_id: &str, account: &Account) -> VaultResult<()>;

    /// Ids of every live account
    async fn list_owners(&self) -> VaultResult<Vec<OwnerId>>;

    /// Move an owner's record out of the live store under `entry_name`
    async fn quarantine(&self, owner_id: &str, entry_name: &str) -> VaultResult<()>;

    /// Names of every quarantined record
    async fn quarantined(&self) -> VaultResult<Vec<String>>;

    /// Permanently remove a quarantined record
    async fn purge(&self, entry_name: &str) -> VaultResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_account_never_holds_credential() {
        let account = Account::new(
            "ghost",
            AccountType::Anonymous,
            Some("secret".to_string()),
            Some("1234".to_string()),
        );
        assert!(account.credential.is_none());
        assert!(account.verification_code.is_none());
        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.credential_matches(None));
    }

    #[test]
    fn test_approval_account_starts_pending() {
        let mut account = Account::new(
            "alice",
            AccountType::ApprovalRequired,
            Some("pw".to_string()),
            Some("1234".to_string()),
        );
        assert_eq!(account.status, AccountStatus::Pending);
        assert!(!account.is_usable());
        assert!(account.is_awaiting_approval());

        account.status = AccountStatus::Active;
        assert!(account.is_usable());
        assert!(!account.is_awaiting_approval());
    }

    #[test]
    fn test_credential_matching() {
        let account = Account::new("bob", AccountType::Standard, Some("pw".to_string()), None);
        assert!(account.credential_matches(Some("pw")));
        assert!(!account.credential_matches(Some("other")));
        assert!(!account.credential_matches(None));
    }

    #[test]
    fn test_owner_id_validation() {
        assert!(validate_owner_id("alice").is_ok());
        assert!(validate_owner_id("alice.smith-2").is_ok());

        assert!(validate_owner_id("").is_err());
        assert!(validate_owner_id(".hidden").is_err());
        assert!(validate_owner_id("a/b").is_err());
        assert!(validate_owner_id("a\\b").is_err());
        assert!(validate_owner_id("bob__1700000000000").is_err());
        assert!(validate_owner_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_account_type_parsing() {
        assert_eq!("standard".parse::<AccountType>().unwrap(), AccountType::Standard);
        assert_eq!("Anonymous".parse::<AccountType>().unwrap(), AccountType::Anonymous);
        assert_eq!(
            "approval-required".parse::<AccountType>().unwrap(),
            AccountType::ApprovalRequired
        );
        assert!("admin".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_record_serializes_with_camel_case_fields() {
        let account = Account::new("carol", AccountType::ApprovalRequired, Some("pw".into()), Some("9876".into()));
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["accountType"], "approval-required");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["verificationCode"], "9876");
    }
}
