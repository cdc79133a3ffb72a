//! The reconciliation engine.
//!
//! Applies the precedence chain - live feed, then ledger, then a
//! caller-supplied default - to produce one authoritative `ReconciledRevenue`
//! per read. Every billing failure degrades to a lower tier; nothing in this
//! module is fatal to the host application.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::billing::{
    BillingError, LiveBillingClient, LiveBillingClientConfig, SubscriptionFeed,
};
use crate::cache::InMemoryCache;
use crate::config::{ProviderConfig, RevenueConfig};
use crate::credentials::{CredentialResolver, CredentialStore};
use crate::error::Result;
use crate::ledger::{
    average_growth, current_month_key, sum_active_ledger, LedgerStore, RevenueSnapshot,
    SourceStatus,
};
use crate::traits::cache::Cache;

use super::cached_feed::CachedRevenueFeed;

/// Which source of truth won the precedence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MrrSource {
    /// The live billing provider answered inside this read (or its window).
    ExternalLive,
    /// The manually maintained ledger.
    Ledger,
    /// The caller-supplied default; neither live feed nor ledger was usable.
    FallbackDefault,
}

impl MrrSource {
    /// String form for logs and the presentation layer.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalLive => "external-live",
            Self::Ledger => "ledger",
            Self::FallbackDefault => "fallback-default",
        }
    }

    /// Whether this figure came from the live feed.
    ///
    /// The presentation layer must label live figures distinctly so a
    /// fallback value is never mistaken for authoritative provider data.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::ExternalLive)
    }
}

/// The engine's output: recomputed on every read, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRevenue {
    /// Monthly recurring revenue in cents.
    pub mrr_cents: i64,
    /// Annual recurring revenue, defined as `mrr_cents * 12`.
    pub arr_cents: i64,
    /// `mrr_cents` minus the expenses of the most recent snapshot (0 if none).
    pub net_mrr_cents: i64,
    /// Average growth across active ledger sources.
    ///
    /// Always ledger-derived, even when `mrr_cents` came from the live feed:
    /// the external feed carries no growth signal in this design. This
    /// asymmetry is deliberate and preserved, not an oversight.
    pub growth_percent: i32,
    /// Which tier of the precedence chain produced `mrr_cents`.
    pub source: MrrSource,
    pub as_of: DateTime<Utc>,
}

/// Outcome of evaluating one precedence tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    /// This tier is usable with the given MRR cents.
    Use(i64),
    /// This tier does not apply; the reason is logged for auditability.
    Skip(String),
}

/// One evaluated tier of the precedence chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceTier {
    pub source: MrrSource,
    pub outcome: TierOutcome,
}

/// Pick the first usable tier.
///
/// The chain built by the engine always ends in a usable fallback tier, so
/// the zero default here is unreachable in practice.
#[must_use]
pub fn select_mrr(tiers: &[PrecedenceTier]) -> (MrrSource, i64) {
    for tier in tiers {
        match &tier.outcome {
            TierOutcome::Use(cents) => {
                tracing::debug!(
                    target: "ledgerline::revenue",
                    source = tier.source.as_str(),
                    mrr_cents = cents,
                    "Precedence tier selected"
                );
                return (tier.source, *cents);
            }
            TierOutcome::Skip(reason) => {
                tracing::debug!(
                    target: "ledgerline::revenue",
                    source = tier.source.as_str(),
                    reason = %reason,
                    "Precedence tier skipped"
                );
            }
        }
    }
    (MrrSource::FallbackDefault, 0)
}

/// Builds a subscription feed for a resolved credential.
///
/// The live implementation constructs an HTTP client per key; tests swap in
/// a mock feed without touching the engine.
pub trait FeedProvider: Send + Sync {
    type Feed: SubscriptionFeed;

    fn feed_for(&self, key: &SecretString) -> std::result::Result<Self::Feed, BillingError>;
}

/// Feed provider backed by `LiveBillingClient`.
#[derive(Debug, Clone)]
pub struct LiveFeedProvider {
    config: ProviderConfig,
}

impl LiveFeedProvider {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

impl FeedProvider for LiveFeedProvider {
    type Feed = LiveBillingClient;

    fn feed_for(&self, key: &SecretString) -> std::result::Result<LiveBillingClient, BillingError> {
        LiveBillingClient::new(
            key.expose_secret().to_string(),
            self.config.base_url.clone(),
            LiveBillingClientConfig::new()
                .timeout_seconds(self.config.timeout_seconds)
                .max_retries(self.config.max_retries),
        )
    }
}

/// The revenue reconciliation engine.
///
/// Stateless per read apart from the revalidation cache; safe to share
/// across concurrent requests.
///
/// # Example
///
/// ```rust,ignore
/// use ledgerline::{ConfigBuilder, RevenueManager};
///
/// let config = ConfigBuilder::new().from_env().build();
/// let manager = RevenueManager::from_config(credential_store, ledger_store, &config);
///
/// let revenue = manager.reconcile("op_42").await?;
/// println!("{} cents/month via {}", revenue.mrr_cents, revenue.source.as_str());
/// ```
pub struct RevenueManager<K, L, P, C> {
    credentials: CredentialResolver<K>,
    ledger: L,
    feeds: P,
    cached: CachedRevenueFeed<C>,
}

impl<K, L, P, C> RevenueManager<K, L, P, C>
where
    K: CredentialStore,
    L: LedgerStore,
    P: FeedProvider,
    C: Cache,
{
    /// Create a manager from explicit parts.
    pub fn new(
        credentials: CredentialResolver<K>,
        ledger: L,
        feeds: P,
        cache: C,
        window: std::time::Duration,
    ) -> Self {
        Self {
            credentials,
            ledger,
            feeds,
            cached: CachedRevenueFeed::new(cache, window),
        }
    }

    /// Reconcile with a zero fallback default.
    pub async fn reconcile(&self, operator_id: &str) -> Result<ReconciledRevenue> {
        self.reconcile_with_default(operator_id, 0).await
    }

    /// Produce the authoritative revenue figure for an operator.
    ///
    /// `fallback_cents` is used only when neither the live feed nor the
    /// ledger is usable - typically 0 or a last-known snapshot total.
    ///
    /// # Errors
    ///
    /// Only ledger store failures surface as errors; every billing failure
    /// degrades to a lower precedence tier.
    pub async fn reconcile_with_default(
        &self,
        operator_id: &str,
        fallback_cents: i64,
    ) -> Result<ReconciledRevenue> {
        let sources = self.ledger.sources_for(operator_id).await?;

        let tiers = [
            PrecedenceTier {
                source: MrrSource::ExternalLive,
                outcome: self.live_tier(operator_id).await?,
            },
            PrecedenceTier {
                source: MrrSource::Ledger,
                outcome: ledger_tier(&sources),
            },
            PrecedenceTier {
                source: MrrSource::FallbackDefault,
                outcome: TierOutcome::Use(fallback_cents),
            },
        ];
        let (source, mrr_cents) = select_mrr(&tiers);

        let expenses_cents = self
            .ledger
            .latest_snapshot(operator_id)
            .await?
            .map(|s| s.expenses_cents)
            .unwrap_or(0);

        let revenue = ReconciledRevenue {
            mrr_cents,
            arr_cents: mrr_cents * 12,
            net_mrr_cents: mrr_cents - expenses_cents,
            growth_percent: average_growth(&sources),
            source,
            as_of: Utc::now(),
        };

        tracing::info!(
            target: "ledgerline::revenue",
            operator_id = operator_id,
            source = revenue.source.as_str(),
            mrr_cents = revenue.mrr_cents,
            net_mrr_cents = revenue.net_mrr_cents,
            "Reconciled revenue"
        );

        Ok(revenue)
    }

    /// Evaluate the live-feed tier.
    ///
    /// Credential absence and every billing failure become skips; only a
    /// credential store failure propagates.
    async fn live_tier(&self, operator_id: &str) -> Result<TierOutcome> {
        let key = match self.credentials.resolve(operator_id).await? {
            Some(key) => key,
            None => return Ok(TierOutcome::Skip("credential absent".to_string())),
        };

        let feed = match self.feeds.feed_for(&key) {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(
                    target: "ledgerline::revenue",
                    operator_id = operator_id,
                    error = %e,
                    "Could not construct billing client"
                );
                return Ok(TierOutcome::Skip(e.to_string()));
            }
        };

        match self.cached.live_total(&key, &feed).await {
            Ok(total) => Ok(TierOutcome::Use(total.mrr_cents)),
            Err(e) => {
                tracing::warn!(
                    target: "ledgerline::revenue",
                    operator_id = operator_id,
                    error = %e,
                    "Live billing fetch failed, falling back to ledger"
                );
                Ok(TierOutcome::Skip(e.to_string()))
            }
        }
    }

    /// Record the current reconciled totals as this month's snapshot.
    ///
    /// Upserts on `(operator_id, month)`, so calling repeatedly within a
    /// month keeps a single row current. Expenses carry over from the
    /// previous snapshot; the CRUD surface owns editing them.
    pub async fn record_monthly_snapshot(&self, operator_id: &str) -> Result<RevenueSnapshot> {
        let revenue = self.reconcile(operator_id).await?;
        let expenses_cents = revenue.mrr_cents - revenue.net_mrr_cents;

        let snapshot = RevenueSnapshot {
            operator_id: operator_id.to_string(),
            month: current_month_key(),
            total_mrr_cents: revenue.mrr_cents,
            expenses_cents,
        };
        self.ledger.upsert_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Snapshot history for trend display, ascending by month.
    pub async fn snapshot_history(&self, operator_id: &str) -> Result<Vec<RevenueSnapshot>> {
        self.ledger.snapshot_history(operator_id).await
    }
}

impl<K, L> RevenueManager<K, L, LiveFeedProvider, InMemoryCache>
where
    K: CredentialStore,
    L: LedgerStore,
{
    /// Assemble the production stack from configuration: two-tier credential
    /// resolution, the live HTTP client, and an in-memory revalidation cache.
    pub fn from_config(credential_store: K, ledger: L, config: &RevenueConfig) -> Self {
        Self::new(
            CredentialResolver::new(credential_store, config.default_api_key.clone()),
            ledger,
            LiveFeedProvider::new(config.provider.clone()),
            InMemoryCache::default(),
            config.revalidation.window(),
        )
    }
}

/// Evaluate the ledger tier: usable when at least one source is active.
fn ledger_tier(sources: &[crate::ledger::RevenueSource]) -> TierOutcome {
    let has_active = sources.iter().any(|s| s.status == SourceStatus::Active);
    if has_active {
        TierOutcome::Use(sum_active_ledger(sources))
    } else {
        TierOutcome::Skip("no active ledger sources".to_string())
    }
}

#[cfg(any(test, feature = "test-revenue"))]
pub mod test {
    use super::*;
    use crate::billing::feed::test::MockSubscriptionFeed;

    /// Feed provider that hands out a shared mock feed regardless of key.
    #[derive(Clone)]
    pub struct MockFeedProvider {
        feed: MockSubscriptionFeed,
    }

    impl MockFeedProvider {
        #[must_use]
        pub fn new(feed: MockSubscriptionFeed) -> Self {
            Self { feed }
        }
    }

    impl FeedProvider for MockFeedProvider {
        type Feed = MockSubscriptionFeed;

        fn feed_for(
            &self,
            _key: &SecretString,
        ) -> std::result::Result<MockSubscriptionFeed, BillingError> {
            Ok(self.feed.clone())
        }
    }
}
