//! Binary Storage Layer Abstraction
//!
//! This module provides one file-management contract over the physical
//! backends (local filesystem, cloud drive, S3-compatible object storage), so
//! the services above never care where the bytes live.
//!
//! Every backend guarantees: `put` then `get` yields the same bytes, `delete`
//! then `get` is `NotFound`, and `list` reflects every completed `put` not yet
//! deleted. The object store's signed-upload flow relaxes this: a listing may
//! lag a client-side transfer that has not finished yet.

pub mod config;
pub mod drive_client;
pub mod drive_store;
pub mod local_store;
pub mod object_client;
pub mod object_store;
pub mod trash_entry;

#[cfg(test)]
mod comprehensive_test;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{VaultError, VaultResult};
use crate::metadata::FileRecord;
pub use trash_entry::TrashEntry;

/// File name the metadata layer used to keep next to user files; never accepted
/// as an upload name.
pub const RESERVED_FILE_NAME: &str = "user.json";

/// Longest path component most filesystems accept
const MAX_PATH_COMPONENT_LEN: usize = 255;

/// Room for the `__<millis>` suffix a trashed file gets
const TRASH_SUFFIX_LEN: usize = 2 + 13;

/// Longest file name whose trash entry still fits in one path component
pub const MAX_FILE_NAME_LEN: usize = MAX_PATH_COMPONENT_LEN - TRASH_SUFFIX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Local,
    CloudDrive,
    ObjectStore,
}

/// What a backend reports after storing bytes
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub locator: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub etag: Option<String>,
    pub link: Option<String>,
}

impl From<StoredFile> for FileRecord {
    fn from(stored: StoredFile) -> Self {
        FileRecord {
            locator: stored.locator,
            size: stored.size,
            created_at: stored.created_at,
            last_signed_at: None,
            etag: stored.etag,
            link: stored.link,
        }
    }
}

/// One entry of an owner's listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub locator: String,
}

/// How a client gets the bytes back
#[derive(Debug, Clone, PartialEq)]
pub enum Download {
    Bytes(Bytes),
    /// Time-limited URL the client fetches directly
    Redirect(String),
}

/// Time-limited permission for the client to write an object directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuthorization {
    pub url: String,
    #[serde(rename = "key")]
    pub locator: String,
    pub expires_at: DateTime<Utc>,
}

/// Trait defining the binary storage interface
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Store bytes under the owner's namespace, replacing a file of the same name
    async fn put(&self, owner_id: &str, file_name: &str, data: Bytes) -> VaultResult<StoredFile>;

    /// Issue an upload URL; the caller performs the transfer itself
    async fn authorize_put(
        &self,
        _owner_id: &str,
        _file_name: &str,
        _content_type: &str,
    ) -> VaultResult<UploadAuthorization> {
        Err(VaultError::invalid(
            "Signed uploads are not supported by this storage backend",
        ))
    }

    async fn get(&self, locator: &str) -> VaultResult<Download>;

    /// Everything currently stored under the owner's namespace
    async fn list(&self, owner_id: &str) -> VaultResult<Vec<FileInfo>>;

    async fn delete(&self, locator: &str) -> VaultResult<()>;

    /// Relocate one file into the quarantine area under `entry`.
    /// `Conflict` when the entry name is already taken.
    async fn quarantine_file(&self, locator: &str, entry: &TrashEntry) -> VaultResult<()>;

    /// Relocate everything the owner stores; `false` when there was nothing
    async fn quarantine_owner(&self, owner_id: &str, entry: &TrashEntry) -> VaultResult<bool>;

    /// Names of every quarantined entry
    async fn quarantined(&self) -> VaultResult<Vec<String>>;

    /// Permanently remove one quarantined entry
    async fn purge(&self, entry_name: &str) -> VaultResult<()>;
}

/// Check that a file name is a single, visible path component
pub fn validate_file_name(name: &str) -> VaultResult<()> {
    if name.is_empty() {
        return Err(VaultError::invalid("Missing file name"));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(VaultError::invalid("File name is too long"));
    }
    if name == RESERVED_FILE_NAME {
        return Err(VaultError::invalid(format!("File name is reserved: {}", name)));
    }
    if name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_control)
    {
        return Err(VaultError::invalid(format!("Invalid file name: {}", name)));
    }
    Ok(())
}

/// `owner/name`, the key convention shared by the path and object backends
pub fn namespaced_key(owner_id: &str, file_name: &str) -> String {
    format!("{}/{}", owner_id, file_name)
}

/// Split an `owner/name` locator, rejecting anything that is not exactly two
/// valid components
pub fn split_namespaced_key(locator: &str) -> VaultResult<(&str, &str)> {
    let (owner_id, file_name) = locator
        .split_once('/')
        .ok_or_else(|| VaultError::invalid(format!("Invalid locator: {}", locator)))?;
    crate::metadata::validate_owner_id(owner_id)?;
    validate_file_name(file_name)?;
    Ok((owner_id, file_name))
}

pub fn compute_etag(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Detect content type from file extension
pub fn detect_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_validation() {
        assert!(validate_file_name("photo.jpg").is_ok());
        assert!(validate_file_name("a__b c.txt").is_ok());

        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(".env").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("dir/file").is_err());
        assert!(validate_file_name("user.json").is_err());
        assert!(validate_file_name(&"n".repeat(MAX_FILE_NAME_LEN)).is_ok());
        assert!(validate_file_name(&"n".repeat(MAX_FILE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(namespaced_key("alice", "a.txt"), "alice/a.txt");
        assert_eq!(split_namespaced_key("alice/a.txt").unwrap(), ("alice", "a.txt"));
        assert!(split_namespaced_key("alice").is_err());
        assert!(split_namespaced_key("alice/x/y").is_err());
        assert!(split_namespaced_key("../a.txt").is_err());
    }

    #[test]
    fn test_etag_is_md5_hex() {
        assert_eq!(compute_etag(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type("a.PNG"), "image/png");
        assert_eq!(detect_content_type("notes"), "application/octet-stream");
    }
}
