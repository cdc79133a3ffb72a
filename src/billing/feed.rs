//! Subscription feed: provider wire types and paginated aggregation.
//!
//! The provider exposes active subscriptions as a cursor-paginated
//! collection. `fetch_live_monthly_total` walks the whole collection and
//! folds every line item through cadence normalization. The fetch is
//! all-or-nothing: any page failure aborts and discards the running sum.

use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::normalize::monthly_equivalent_cents;

/// Page size requested from the provider.
pub const PAGE_LIMIT: usize = 100;

/// Hard cap on pages per fetch, bounding worst-case latency against a
/// misbehaving upstream that keeps answering `has_more = true`.
pub const MAX_PAGES: usize = 1_000;

/// Billing cadence unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Day,
    Week,
    Month,
    Year,
}

/// Recurrence of a price: bill every `interval_count` `interval`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurring {
    pub interval: BillingInterval,
    #[serde(default = "default_interval_count")]
    pub interval_count: i64,
}

/// Price attached to a billed line item. `unit_amount` is in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub unit_amount: i64,
    pub recurring: Recurring,
}

/// One billed line item on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub price: Price,
}

/// One active subscription. Exists only during a fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub items: Vec<SubscriptionItem>,
}

/// One page of the provider's subscription collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPage {
    #[serde(default)]
    pub data: Vec<Subscription>,
    #[serde(default)]
    pub has_more: bool,
}

fn default_interval_count() -> i64 {
    1
}

fn default_quantity() -> i64 {
    1
}

/// Aggregate of a completed fetch across all pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRevenueTotal {
    /// Monthly-equivalent revenue in cents across every line item.
    pub mrr_cents: i64,
    /// Number of subscriptions seen.
    pub subscription_count: usize,
}

/// Source of subscription pages.
///
/// `LiveBillingClient` implements this over HTTP; a mock implementation is
/// provided for testing pagination behavior.
pub trait SubscriptionFeed: Send + Sync {
    /// Fetch one page of active subscriptions.
    ///
    /// `cursor` is the id of the last subscription of the previous page
    /// (`starting_after` semantics), or `None` for the first page.
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
    ) -> std::result::Result<SubscriptionPage, BillingError>;
}

/// Fetch the live monthly total by walking every page of the feed.
///
/// Returns the normalized sum and subscription count, or the first error
/// encountered. A failure on any page after the first is reported as
/// `UpstreamPartial`; the partial sum is discarded either way, so a caller
/// can never mistake a truncated fetch for a low total.
pub async fn fetch_live_monthly_total<F: SubscriptionFeed>(
    feed: &F,
) -> std::result::Result<LiveRevenueTotal, BillingError> {
    let mut mrr_cents: i64 = 0;
    let mut subscription_count: usize = 0;
    let mut cursor: Option<String> = None;
    let mut pages: usize = 0;

    loop {
        if pages >= MAX_PAGES {
            return Err(BillingError::PageCapExceeded { pages });
        }

        let page = match feed.fetch_page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(err) if pages > 0 => {
                return Err(BillingError::UpstreamPartial {
                    page: pages + 1,
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };
        pages += 1;

        subscription_count += page.data.len();
        for subscription in &page.data {
            for item in &subscription.items {
                mrr_cents += monthly_equivalent_cents(item);
            }
        }

        if !page.has_more {
            break;
        }
        cursor = match page.data.last() {
            Some(last) => Some(last.id.clone()),
            // has_more with an empty page is a provider bug; stop rather than loop
            None => break,
        };
    }

    tracing::debug!(
        target: "ledgerline::billing::provider",
        mrr_cents,
        subscription_count,
        pages,
        "Completed live subscription fetch"
    );

    Ok(LiveRevenueTotal {
        mrr_cents,
        subscription_count,
    })
}

#[cfg(any(test, feature = "test-revenue"))]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    /// Mock subscription feed serving a fixed sequence of pages.
    #[derive(Default, Clone)]
    pub struct MockSubscriptionFeed {
        pages: Arc<RwLock<Vec<SubscriptionPage>>>,
        /// 1-based page number that fails, if any.
        fail_on_page: Option<usize>,
        calls: Arc<AtomicUsize>,
        cursors_seen: Arc<RwLock<Vec<Option<String>>>>,
    }

    impl MockSubscriptionFeed {
        /// Create a mock feed over a fixed page sequence.
        #[must_use]
        pub fn new(pages: Vec<SubscriptionPage>) -> Self {
            Self {
                pages: Arc::new(RwLock::new(pages)),
                fail_on_page: None,
                calls: Arc::new(AtomicUsize::new(0)),
                cursors_seen: Arc::new(RwLock::new(Vec::new())),
            }
        }

        /// Make the given 1-based page fetch fail.
        #[must_use]
        pub fn failing_on_page(mut self, page: usize) -> Self {
            self.fail_on_page = Some(page);
            self
        }

        /// Number of upstream calls made.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Cursors received, in call order.
        pub fn cursors_seen(&self) -> Vec<Option<String>> {
            self.cursors_seen.read().unwrap().clone()
        }

        /// Build a page of flat monthly subscriptions.
        #[must_use]
        pub fn monthly_page(
            prefix: &str,
            count: usize,
            unit_amount: i64,
            has_more: bool,
        ) -> SubscriptionPage {
            let data = (0..count)
                .map(|i| Subscription {
                    id: format!("{}_{}", prefix, i),
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
                })
                .collect();
            SubscriptionPage { data, has_more }
        }
    }

    impl SubscriptionFeed for MockSubscriptionFeed {
        async fn fetch_page(
            &self,
            cursor: Option<&str>,
        ) -> std::result::Result<SubscriptionPage, BillingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cursors_seen
                .write()
                .unwrap()
                .push(cursor.map(String::from));

            let pages = self.pages.read().unwrap();
            // Resolve the cursor the way the provider does: the page after
            // the one whose last subscription carries the cursor id.
            let index = match cursor {
                None => 0,
                Some(c) => pages
                    .iter()
                    .position(|p| p.data.last().map(|s| s.id.as_str()) == Some(c))
                    .map(|i| i + 1)
                    .ok_or_else(|| BillingError::UpstreamUnavailable {
                        status: Some(400),
                        message: format!("mock: unknown cursor {}", c),
                    })?,
            };

            if self.fail_on_page == Some(index + 1) {
                return Err(BillingError::UpstreamUnavailable {
                    status: Some(503),
                    message: format!("mock failure on page {}", index + 1),
                });
            }

            pages
                .get(index)
                .cloned()
                .ok_or_else(|| BillingError::UpstreamUnavailable {
                    status: Some(404),
                    message: format!("mock has no page {}", index + 1),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::MockSubscriptionFeed;
    use super::*;

    #[tokio::test]
    async fn test_pagination_sums_all_pages_with_exact_call_count() {
        let feed = MockSubscriptionFeed::new(vec![
            MockSubscriptionFeed::monthly_page("a", 100, 10, true),
            MockSubscriptionFeed::monthly_page("b", 100, 10, true),
            MockSubscriptionFeed::monthly_page("c", 37, 10, false),
        ]);

        let total = fetch_live_monthly_total(&feed).await.unwrap();
        assert_eq!(total.subscription_count, 237);
        assert_eq!(total.mrr_cents, 2370);
        assert_eq!(feed.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cursor_is_last_id_of_previous_page() {
        let feed = MockSubscriptionFeed::new(vec![
            MockSubscriptionFeed::monthly_page("a", 2, 10, true),
            MockSubscriptionFeed::monthly_page("b", 1, 10, false),
        ]);

        fetch_live_monthly_total(&feed).await.unwrap();
        assert_eq!(
            feed.cursors_seen(),
            vec![None, Some("a_1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mid_pagination_failure_discards_partial_sum() {
        let feed = MockSubscriptionFeed::new(vec![
            MockSubscriptionFeed::monthly_page("a", 100, 10, true),
            MockSubscriptionFeed::monthly_page("b", 100, 10, true),
            MockSubscriptionFeed::monthly_page("c", 37, 10, false),
        ])
        .failing_on_page(2);

        let err = fetch_live_monthly_total(&feed).await.unwrap_err();
        assert!(matches!(err, BillingError::UpstreamPartial { page: 2, .. }));
    }

    #[tokio::test]
    async fn test_first_page_failure_is_unavailable_not_partial() {
        let feed = MockSubscriptionFeed::new(vec![MockSubscriptionFeed::monthly_page(
            "a", 1, 10, false,
        )])
        .failing_on_page(1);

        let err = fetch_live_monthly_total(&feed).await.unwrap_err();
        assert!(matches!(err, BillingError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_collection_is_zero() {
        let feed = MockSubscriptionFeed::new(vec![SubscriptionPage {
            data: vec![],
            has_more: false,
        }]);

        let total = fetch_live_monthly_total(&feed).await.unwrap();
        assert_eq!(total.mrr_cents, 0);
        assert_eq!(total.subscription_count, 0);
    }

    #[tokio::test]
    async fn test_has_more_with_empty_page_terminates() {
        let feed = MockSubscriptionFeed::new(vec![SubscriptionPage {
            data: vec![],
            has_more: true,
        }]);

        let total = fetch_live_monthly_total(&feed).await.unwrap();
        assert_eq!(total.mrr_cents, 0);
        assert_eq!(feed.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mixed_cadences_across_items() {
        let page = SubscriptionPage {
            data: vec![Subscription {
                id: "sub_1".to_string(),
                items: vec![
                    SubscriptionItem {
                        quantity: 1,
                        price: Price {
                            unit_amount: 1200,
                            recurring: Recurring {
                                interval: BillingInterval::Year,
                                interval_count: 1,
                            },
                        },
                    },
                    SubscriptionItem {
                        quantity: 3,
                        price: Price {
                            unit_amount: 10,
                            recurring: Recurring {
                                interval: BillingInterval::Day,
                                interval_count: 2,
                            },
                        },
                    },
                ],
            }],
            has_more: false,
        };
        let feed = MockSubscriptionFeed::new(vec![page]);

        let total = fetch_live_monthly_total(&feed).await.unwrap();
        // 1200/12 + (10*3*30)/2 = 100 + 450
        assert_eq!(total.mrr_cents, 550);
        assert_eq!(total.subscription_count, 1);
    }

    #[test]
    fn test_page_deserializes_provider_shape() {
        let json = r#"{
            "data": [{
                "id": "sub_123",
                "items": [{
                    "quantity": 2,
                    "price": {
                        "unit_amount": 4999,
                        "recurring": { "interval": "month", "interval_count": 1 }
                    }
                }]
            }],
            "has_more": true
        }"#;

        let page: SubscriptionPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.has_more);
        assert_eq!(page.data[0].items[0].quantity, 2);
        assert_eq!(page.data[0].items[0].price.unit_amount, 4999);
        assert_eq!(
            page.data[0].items[0].price.recurring.interval,
            BillingInterval::Month
        );
    }

    #[test]
    fn test_quantity_and_interval_count_default_to_one() {
        let json = r#"{
            "data": [{
                "id": "sub_1",
                "items": [{
                    "price": {
                        "unit_amount": 100,
                        "recurring": { "interval": "week" }
                    }
                }]
            }],
            "has_more": false
        }"#;

        let page: SubscriptionPage = serde_json::from_str(json).unwrap();
        let item = &page.data[0].items[0];
        assert_eq!(item.quantity, 1);
        assert_eq!(item.price.recurring.interval_count, 1);
    }
}
