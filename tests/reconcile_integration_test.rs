//! End-to-end tests for the reconciliation engine over the public API.
//!
//! Wires a RevenueManager from the public seams only: a local mock feed
//! standing in for the billing provider, in-process credential and ledger
//! stores, and the bundled in-memory cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use ledgerline::billing::{
    BillingError, BillingInterval, Price, Recurring, Subscription, SubscriptionFeed,
    SubscriptionItem, SubscriptionPage,
};
use ledgerline::{
    Cache, CredentialResolver, CredentialStore, FeedProvider, InMemoryCache, LedgerStore,
    MrrSource, RevenueManager, RevenueSnapshot, RevenueSource, SourceStatus, BILLING_API_KEY,
};

const TEST_KEY: &str = "sk_test_12345678901234567890";

// ============================================================================
// Fixtures
// ============================================================================

/// Provider stand-in serving fixed pages and counting upstream calls.
#[derive(Clone, Default)]
struct FixedFeed {
    pages: Arc<RwLock<Vec<SubscriptionPage>>>,
    calls: Arc<AtomicUsize>,
}

impl FixedFeed {
    fn new(pages: Vec<SubscriptionPage>) -> Self {
        Self {
            pages: Arc::new(RwLock::new(pages)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SubscriptionFeed for FixedFeed {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
    ) -> std::result::Result<SubscriptionPage, BillingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().unwrap();
        let index = match cursor {
            None => 0,
            Some(c) => pages
                .iter()
                .position(|p| p.data.last().map(|s| s.id.as_str()) == Some(c))
                .map(|i| i + 1)
                .unwrap_or(usize::MAX),
        };
        pages
            .get(index)
            .cloned()
            .ok_or_else(|| BillingError::UpstreamUnavailable {
                status: Some(404),
                message: "no such page".to_string(),
            })
    }
}

#[derive(Clone)]
struct FixedFeedProvider(FixedFeed);

impl FeedProvider for FixedFeedProvider {
    type Feed = FixedFeed;

    fn feed_for(&self, _key: &SecretString) -> std::result::Result<FixedFeed, BillingError> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Default)]
struct MapCredentialStore {
    keys: Arc<RwLock<std::collections::HashMap<String, String>>>,
}

impl MapCredentialStore {
    fn with_key(operator_id: &str, key: &str) -> Self {
        let store = Self::default();
        store
            .keys
            .write()
            .unwrap()
            .insert(operator_id.to_string(), key.to_string());
        store
    }
}

#[async_trait]
impl CredentialStore for MapCredentialStore {
    async fn get(
        &self,
        operator_id: &str,
        key_name: &str,
    ) -> ledgerline::Result<Option<String>> {
        if key_name != BILLING_API_KEY {
            return Ok(None);
        }
        Ok(self.keys.read().unwrap().get(operator_id).cloned())
    }
}

#[derive(Clone, Default)]
struct VecLedgerStore {
    sources: Arc<RwLock<Vec<RevenueSource>>>,
    snapshots: Arc<RwLock<Vec<RevenueSnapshot>>>,
}

impl VecLedgerStore {
    fn add(&self, source: RevenueSource) {
        self.sources.write().unwrap().push(source);
    }
}

#[async_trait]
impl LedgerStore for VecLedgerStore {
    async fn sources_for(&self, operator_id: &str) -> ledgerline::Result<Vec<RevenueSource>> {
        Ok(self
            .sources
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.operator_id == operator_id)
            .cloned()
            .collect())
    }

    async fn latest_snapshot(
        &self,
        operator_id: &str,
    ) -> ledgerline::Result<Option<RevenueSnapshot>> {
        let history = self.snapshot_history(operator_id).await?;
        Ok(history.into_iter().next_back())
    }

    async fn snapshot_history(
        &self,
        operator_id: &str,
    ) -> ledgerline::Result<Vec<RevenueSnapshot>> {
        let mut history: Vec<RevenueSnapshot> = self
            .snapshots
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.operator_id == operator_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(history)
    }

    async fn upsert_snapshot(&self, snapshot: &RevenueSnapshot) -> ledgerline::Result<()> {
        let mut snapshots = self.snapshots.write().unwrap();
        snapshots.retain(|s| {
            !(s.operator_id == snapshot.operator_id && s.month == snapshot.month)
        });
        snapshots.push(snapshot.clone());
        Ok(())
    }
}

fn monthly_subscription(id: &str, unit_amount: i64) -> Subscription {
    Subscription {
        id: id.to_string(),
        items: vec![SubscriptionItem {
            quantity: 1,
            price: Price {
                unit_amount,
                recurring: Recurring {
                    interval: BillingInterval::Month,
                    interval_count: 1,
                },
            },
        }],
    }
}

fn manager<C: Cache>(
    credentials: MapCredentialStore,
    ledger: VecLedgerStore,
    feed: FixedFeed,
    cache: C,
    window: Duration,
) -> RevenueManager<MapCredentialStore, VecLedgerStore, FixedFeedProvider, C> {
    RevenueManager::new(
        CredentialResolver::new(credentials, None),
        ledger,
        FixedFeedProvider(feed),
        cache,
        window,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_live_feed_overrides_ledger_end_to_end() {
    let feed = FixedFeed::new(vec![SubscriptionPage {
        data: vec![
            monthly_subscription("sub_a", 2500),
            monthly_subscription("sub_b", 7500),
        ],
        has_more: false,
    }]);
    let ledger = VecLedgerStore::default();
    ledger.add(RevenueSource::new("op_1", "Old consulting", "services", 999_999));

    let manager = manager(
        MapCredentialStore::with_key("op_1", TEST_KEY),
        ledger,
        feed,
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    let revenue = manager.reconcile("op_1").await.unwrap();
    assert_eq!(revenue.source, MrrSource::ExternalLive);
    assert_eq!(revenue.mrr_cents, 10_000);
    assert_eq!(revenue.arr_cents, 120_000);
}

#[tokio::test]
async fn test_cache_bounds_upstream_calls_across_reconciles() {
    let feed = FixedFeed::new(vec![SubscriptionPage {
        data: vec![monthly_subscription("sub_a", 100)],
        has_more: false,
    }]);
    let cache = InMemoryCache::new(100);

    let manager = manager(
        MapCredentialStore::with_key("op_1", TEST_KEY),
        VecLedgerStore::default(),
        feed.clone(),
        cache.clone(),
        Duration::from_millis(40),
    );

    // Two reads inside the window share one fetch
    manager.reconcile("op_1").await.unwrap();
    manager.reconcile("op_1").await.unwrap();
    assert_eq!(feed.call_count(), 1);

    // A read after the window expires fetches again
    tokio::time::sleep(Duration::from_millis(80)).await;
    cache.run_pending_tasks().await;
    manager.reconcile("op_1").await.unwrap();
    assert_eq!(feed.call_count(), 2);
}

#[tokio::test]
async fn test_precedence_chain_degrades_to_default() {
    // No credential anywhere, ledger holds only a paused source
    let ledger = VecLedgerStore::default();
    ledger.add(
        RevenueSource::new("op_1", "Dormant", "saas", 500_000_00)
            .with_status(SourceStatus::Paused),
    );

    let manager = manager(
        MapCredentialStore::default(),
        ledger,
        FixedFeed::default(),
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    let revenue = manager
        .reconcile_with_default("op_1", 12_345)
        .await
        .unwrap();
    assert_eq!(revenue.source, MrrSource::FallbackDefault);
    assert_eq!(revenue.mrr_cents, 12_345);
    assert!(!revenue.source.is_live());
}

#[tokio::test]
async fn test_ledger_tier_with_mixed_statuses() {
    let ledger = VecLedgerStore::default();
    ledger.add(RevenueSource::new("op_1", "SaaS", "saas", 3200_00).with_growth(4));
    ledger.add(
        RevenueSource::new("op_1", "Paused deal", "services", 500_000_00)
            .with_status(SourceStatus::Paused),
    );
    ledger.add(
        RevenueSource::new("op_1", "Done", "services", 100_00).with_status(SourceStatus::Closed),
    );

    let manager = manager(
        MapCredentialStore::default(),
        ledger,
        FixedFeed::default(),
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    let revenue = manager.reconcile("op_1").await.unwrap();
    assert_eq!(revenue.source, MrrSource::Ledger);
    assert_eq!(revenue.mrr_cents, 3200_00);
    assert_eq!(revenue.growth_percent, 4);
}

#[tokio::test]
async fn test_provider_failure_is_invisible_to_caller() {
    // Feed with no pages: every fetch errors
    let feed = FixedFeed::new(vec![]);
    let ledger = VecLedgerStore::default();
    ledger.add(RevenueSource::new("op_1", "Retainer", "services", 1500_00));

    let manager = manager(
        MapCredentialStore::with_key("op_1", TEST_KEY),
        ledger,
        feed,
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    let revenue = manager.reconcile("op_1").await.unwrap();
    assert_eq!(revenue.source, MrrSource::Ledger);
    assert_eq!(revenue.mrr_cents, 1500_00);
}

#[tokio::test]
async fn test_snapshot_lifecycle() {
    let ledger = VecLedgerStore::default();
    ledger.add(RevenueSource::new("op_1", "SaaS", "saas", 2000_00));
    ledger
        .upsert_snapshot(&RevenueSnapshot {
            operator_id: "op_1".to_string(),
            month: "2020-01".to_string(),
            total_mrr_cents: 500_00,
            expenses_cents: 300_00,
        })
        .await
        .unwrap();

    let manager = manager(
        MapCredentialStore::default(),
        ledger,
        FixedFeed::default(),
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    // Net MRR subtracts the latest snapshot's expenses
    let revenue = manager.reconcile("op_1").await.unwrap();
    assert_eq!(revenue.net_mrr_cents, 2000_00 - 300_00);

    // Recording appends the current month, carrying expenses forward
    let snapshot = manager.record_monthly_snapshot("op_1").await.unwrap();
    assert_eq!(snapshot.total_mrr_cents, 2000_00);
    assert_eq!(snapshot.expenses_cents, 300_00);

    let history = manager.snapshot_history("op_1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].month, "2020-01");
    assert_eq!(history[1].month, snapshot.month);
}

#[tokio::test]
async fn test_multi_page_collection_reconciles_fully() {
    let first: Vec<Subscription> = (0..100)
        .map(|i| monthly_subscription(&format!("sub_a{}", i), 100))
        .collect();
    let second: Vec<Subscription> = (0..37)
        .map(|i| monthly_subscription(&format!("sub_b{}", i), 100))
        .collect();

    let feed = FixedFeed::new(vec![
        SubscriptionPage {
            data: first,
            has_more: true,
        },
        SubscriptionPage {
            data: second,
            has_more: false,
        },
    ]);

    let manager = manager(
        MapCredentialStore::with_key("op_1", TEST_KEY),
        VecLedgerStore::default(),
        feed.clone(),
        InMemoryCache::new(100),
        Duration::from_secs(1800),
    );

    let revenue = manager.reconcile("op_1").await.unwrap();
    assert_eq!(revenue.source, MrrSource::ExternalLive);
    assert_eq!(revenue.mrr_cents, 137 * 100);
    assert_eq!(feed.call_count(), 2);
}
