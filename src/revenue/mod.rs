//! Revenue reconciliation.
//!
//! Merges the live billing feed, the manual ledger, and a caller-supplied
//! fallback into one authoritative MRR/ARR figure per operator, with a
//! time-boxed cache bounding how often the provider is hit.

pub mod cached_feed;
pub mod reconcile;

pub use cached_feed::CachedRevenueFeed;
pub use reconcile::{
    FeedProvider, LiveFeedProvider, MrrSource, PrecedenceTier, ReconciledRevenue, RevenueManager,
    TierOutcome,
};

// Test exports
#[cfg(any(test, feature = "test-revenue"))]
pub use reconcile::test::MockFeedProvider;
