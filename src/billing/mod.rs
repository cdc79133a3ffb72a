//! Billing provider integration.
//!
//! Talks to the external billing provider's active-subscriptions collection,
//! normalizes every billed line item to a monthly-equivalent amount in cents,
//! and aggregates across pages. A fetch either covers the whole collection or
//! fails as a unit - partial sums are never returned, so a flaky upstream can
//! under-report availability but never revenue.

pub mod error;
pub mod feed;
pub mod live_client;
pub mod normalize;

pub use error::BillingError;
pub use feed::{
    fetch_live_monthly_total, BillingInterval, LiveRevenueTotal, Price, Recurring, Subscription,
    SubscriptionFeed, SubscriptionItem, SubscriptionPage, MAX_PAGES, PAGE_LIMIT,
};
pub use live_client::{LiveBillingClient, LiveBillingClientConfig};
pub use normalize::monthly_equivalent_cents;

// Test exports
#[cfg(any(test, feature = "test-revenue"))]
pub use feed::test::MockSubscriptionFeed;
