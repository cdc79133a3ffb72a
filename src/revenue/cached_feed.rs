//! Time-boxed cache in front of the live billing fetch.
//!
//! Correctness requirement: never call the upstream provider more than once
//! per revalidation window per credential. The cache is deliberately coarse -
//! one entry per credential, not per subscription - and is consulted lazily
//! on each read; there is no background refresh.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::billing::{fetch_live_monthly_total, BillingError, LiveRevenueTotal, SubscriptionFeed};
use crate::traits::cache::{Cache, CacheExt};

/// Cache key namespace for live revenue totals.
const CACHE_KEY_PREFIX: &str = "revenue:live:";

/// Wraps the paginated live fetch with a per-credential revalidation cache.
///
/// Operators sharing the process-default credential intentionally share one
/// cached total. Failed fetches are never cached, and a failing cache backend
/// degrades to a direct fetch rather than a hard failure. Concurrent refresh
/// for the same credential is last-writer-wins; both writers hold
/// independently valid fetches of the same upstream truth.
#[derive(Clone)]
pub struct CachedRevenueFeed<C> {
    cache: C,
    window: Duration,
}

impl<C: Cache> CachedRevenueFeed<C> {
    /// Create a cached feed with the given revalidation window.
    pub fn new(cache: C, window: Duration) -> Self {
        Self { cache, window }
    }

    /// The configured revalidation window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the live monthly total, reusing a cached value inside the window.
    ///
    /// On a miss or expiry, performs the fetch through `feed` and stores the
    /// result with the window as TTL.
    pub async fn live_total<F: SubscriptionFeed>(
        &self,
        key: &SecretString,
        feed: &F,
    ) -> std::result::Result<LiveRevenueTotal, BillingError> {
        let cache_key = credential_cache_key(key);

        match self.cache.get::<LiveRevenueTotal>(&cache_key).await {
            Ok(Some(total)) => {
                tracing::debug!(
                    target: "ledgerline::revenue",
                    mrr_cents = total.mrr_cents,
                    "Live total served from revalidation cache"
                );
                return Ok(total);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    target: "ledgerline::revenue",
                    error = %e,
                    "Revalidation cache read failed, fetching directly"
                );
            }
        }

        let total = fetch_live_monthly_total(feed).await?;

        if let Err(e) = self
            .cache
            .set(&cache_key, &total, Some(self.window))
            .await
        {
            tracing::warn!(
                target: "ledgerline::revenue",
                error = %e,
                "Failed to store live total in revalidation cache"
            );
        }

        Ok(total)
    }
}

/// Derive the cache key for a credential.
///
/// The key material never appears in the cache itself; the entry is addressed
/// by a SHA-256 digest prefix.
fn credential_cache_key(key: &SecretString) -> String {
    let digest = Sha256::digest(key.expose_secret().as_bytes());
    let mut hex = String::with_capacity(CACHE_KEY_PREFIX.len() + 16);
    hex.push_str(CACHE_KEY_PREFIX);
    for byte in &digest[..8] {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::feed::test::MockSubscriptionFeed;
    use crate::cache::{InMemoryCache, NoOpCache};

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_cache_key_is_stable_and_redacted() {
        let a = credential_cache_key(&secret("sk_test_12345678901234567890"));
        let b = credential_cache_key(&secret("sk_test_12345678901234567890"));
        let c = credential_cache_key(&secret("sk_test_other_key_0987654321"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(CACHE_KEY_PREFIX));
        assert!(!a.contains("sk_test"));
        // prefix + 8 bytes hex
        assert_eq!(a.len(), CACHE_KEY_PREFIX.len() + 16);
    }

    #[tokio::test]
    async fn test_second_call_within_window_hits_cache() {
        let feed =
            MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page("a", 2, 100, false)]);
        let cached = CachedRevenueFeed::new(InMemoryCache::new(100), Duration::from_secs(1800));
        let key = secret("sk_test_12345678901234567890");

        let first = cached.live_total(&key, &feed).await.unwrap();
        let second = cached.live_total(&key, &feed).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.mrr_cents, 200);
        assert_eq!(feed.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_window_triggers_new_fetch() {
        let feed =
            MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page("a", 1, 100, false)]);
        let cache = InMemoryCache::new(100);
        let cached = CachedRevenueFeed::new(cache.clone(), Duration::from_millis(10));
        let key = secret("sk_test_12345678901234567890");

        cached.live_total(&key, &feed).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.run_pending_tasks().await;
        cached.live_total(&key, &feed).await.unwrap();

        assert_eq!(feed.call_count(), 2);
    }

    #[tokio::test]
    async fn test_distinct_credentials_do_not_share_entries() {
        let feed =
            MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page("a", 1, 100, false)]);
        let cached = CachedRevenueFeed::new(InMemoryCache::new(100), Duration::from_secs(1800));

        cached
            .live_total(&secret("sk_test_first_key_1234567890"), &feed)
            .await
            .unwrap();
        cached
            .live_total(&secret("sk_test_second_key_123456789"), &feed)
            .await
            .unwrap();

        assert_eq!(feed.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let feed = MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page(
            "a", 1, 100, false,
        )])
        .failing_on_page(1);
        let cached = CachedRevenueFeed::new(InMemoryCache::new(100), Duration::from_secs(1800));
        let key = secret("sk_test_12345678901234567890");

        assert!(cached.live_total(&key, &feed).await.is_err());
        assert!(cached.live_total(&key, &feed).await.is_err());

        // Each failure reached upstream; nothing poisoned the cache
        assert_eq!(feed.call_count(), 2);
    }

    #[tokio::test]
    async fn test_noop_cache_always_fetches() {
        let feed =
            MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page("a", 1, 100, false)]);
        let cached = CachedRevenueFeed::new(NoOpCache, Duration::from_secs(1800));
        let key = secret("sk_test_12345678901234567890");

        cached.live_total(&key, &feed).await.unwrap();
        cached.live_total(&key, &feed).await.unwrap();

        assert_eq!(feed.call_count(), 2);
    }
}
