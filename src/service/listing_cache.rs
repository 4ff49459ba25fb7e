//! Short-lived per-owner cache of resolved listings
//!
//! Backed by moka with a TTL and a capacity bound. A lookup miss hands out a
//! ticket stamped from a monotonic sequence; `invalidate` records the
//! sequence at which an owner changed, so a listing computed before an
//! invalidation is refused by `store` instead of resurrecting stale data.

use crate::storage::FileInfo;
use log::debug;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Owners whose listings are kept at once
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// moka refuses expirations beyond 1000 years
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTicket {
    owner_id: String,
    epoch: u64,
    issued: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Vec<FileInfo>),
    Miss(CacheTicket),
}

#[derive(Clone)]
struct CachedListing {
    files: Arc<Vec<FileInfo>>,
    stored_at: Instant,
}

pub struct ListingCache {
    ttl: Duration,
    listings: Cache<String, CachedListing>,
    /// owner -> sequence of its latest invalidation
    invalidated: Cache<String, u64>,
    sequence: AtomicU64,
    /// Tickets issued below this are refused; raised when an invalidation
    /// record is evicted for capacity
    floor: Arc<AtomicU64>,
    /// Bumped by `clear`
    epoch: AtomicU64,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: u64) -> Self {
        let ttl = ttl.min(MAX_TTL);
        let floor = Arc::new(AtomicU64::new(0));
        let evicted = floor.clone();
        Self {
            ttl,
            listings: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            invalidated: Cache::builder()
                .max_capacity(max_entries.saturating_mul(4).max(1))
                .eviction_listener(move |_owner: Arc<String>, at: u64, cause: RemovalCause| {
                    if cause == RemovalCause::Size {
                        evicted.fetch_max(at.saturating_add(1), Ordering::SeqCst);
                    }
                })
                .build(),
            sequence: AtomicU64::new(1),
            floor,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, owner_id: &str, now: Instant) -> CacheLookup {
        let key = owner_id.to_string();
        if let Some(listing) = self.listings.get(&key) {
            if now.saturating_duration_since(listing.stored_at) < self.ttl {
                return CacheLookup::Hit(listing.files.as_ref().clone());
            }
        }
        CacheLookup::Miss(CacheTicket {
            owner_id: key,
            epoch: self.epoch.load(Ordering::SeqCst),
            issued: self.sequence.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn is_current(&self, ticket: &CacheTicket) -> bool {
        self.epoch.load(Ordering::SeqCst) == ticket.epoch
            && self.floor.load(Ordering::SeqCst) <= ticket.issued
            && self
                .invalidated
                .get(&ticket.owner_id)
                .map_or(true, |at| at < ticket.issued)
    }

    /// Keep a listing computed after `ticket` was issued. Returns false when
    /// the owner was invalidated in the meantime.
    pub fn store(&self, ticket: CacheTicket, files: Vec<FileInfo>, now: Instant) -> bool {
        if !self.is_current(&ticket) {
            debug!("Dropping listing of {} computed before an invalidation", ticket.owner_id);
            return false;
        }
        self.listings.insert(
            ticket.owner_id.clone(),
            CachedListing {
                files: Arc::new(files),
                stored_at: now,
            },
        );
        // an invalidation that raced the insert wins
        if !self.is_current(&ticket) {
            self.listings.invalidate(&ticket.owner_id);
            return false;
        }
        true
    }

    pub fn invalidate(&self, owner_id: &str) {
        let key = owner_id.to_string();
        let at = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.invalidated.insert(key.clone(), at);
        self.listings.invalidate(&key);
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.listings.invalidate_all();
    }

    /// Cached listings, counting entries not yet evicted
    pub fn entry_count(&self) -> u64 {
        self.listings.entry_count()
    }

    #[cfg(test)]
    fn run_pending_tasks(&self) {
        self.listings.run_pending_tasks();
        self.invalidated.run_pending_tasks();
    }
}
