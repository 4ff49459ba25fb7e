//! Services wired on top of the storage and metadata layers

pub mod access_policy;
pub mod account_service;
pub mod admin;
pub mod listing_cache;
pub mod metadata_service;
pub mod retention_worker;
pub mod storage_service;
pub mod trash_service;
pub mod user_context;
