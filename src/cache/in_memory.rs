//! In-memory cache implementation backed by moka
//!
//! Uses the moka crate for a production-grade concurrent cache with:
//! - True concurrent access (lock-free reads)
//! - TinyLFU eviction policy (combines LRU and LFU)
//! - Automatic TTL expiration
//! - Bounded by entry count

use crate::error::Result;
use crate::traits::cache::Cache;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Default TTL for cache entries when none is specified (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry that stores value with optional custom TTL
#[derive(Clone)]
struct CacheEntry {
    value: Vec<u8>,
    /// Custom TTL for this entry, None means use default
    custom_ttl: Option<Duration>,
}

/// Expiry implementation that supports per-entry TTL
struct CacheExpiry {
    default_ttl: Duration,
}

impl Expiry<String, CacheEntry> for CacheExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.custom_ttl.unwrap_or(self.default_ttl))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        // Don't change expiry on read (TTL behavior, not TTI)
        duration_until_expiry
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Reset TTL on update
        Some(value.custom_ttl.unwrap_or(self.default_ttl))
    }
}

/// In-memory cache implementation backed by moka
///
/// Suitable as the default revalidation store: a cached live-revenue total is
/// keyed per credential and expires after the revalidation window, so repeated
/// reconciliations inside the window never touch the provider.
///
/// # Example
///
/// ```rust,ignore
/// use ledgerline::cache::InMemoryCache;
/// use ledgerline::traits::cache::CacheExt;
///
/// let cache = InMemoryCache::new(10_000); // 10,000 max entries
///
/// // Store a value with a 30 minute TTL
/// cache.set("revenue:live:abc", &total, Some(Duration::from_secs(1800))).await?;
///
/// // Retrieve
/// let total: Option<LiveRevenueTotal> = cache.get("revenue:live:abc").await?;
/// ```
#[derive(Clone)]
pub struct InMemoryCache {
    inner: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Create a new in-memory cache with the specified maximum number of entries
    ///
    /// The cache will automatically evict entries when at capacity using the
    /// TinyLFU policy, which prioritizes keeping frequently and recently accessed
    /// entries.
    pub fn new(max_entries: u64) -> Self {
        Self::with_ttl(max_entries, DEFAULT_TTL)
    }

    /// Create a cache with custom default TTL
    pub fn with_ttl(max_entries: u64, default_ttl: Duration) -> Self {
        let expiry = CacheExpiry { default_ttl };
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(expiry)
            .build();

        Self { inner: cache }
    }

    /// Run pending maintenance tasks (eviction, expiration)
    ///
    /// Moka runs maintenance automatically, but this can be called
    /// to force immediate cleanup if needed.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry {
            value,
            custom_ttl: ttl,
        };
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.invalidate_all();
        // Run pending tasks to ensure invalidation completes
        self.inner.run_pending_tasks().await;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true // Moka is always healthy as an in-memory cache
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
