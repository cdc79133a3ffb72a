//! Ledgerline - a revenue reconciliation engine
//!
//! Ledgerline produces one authoritative monthly-recurring-revenue figure per
//! operator from three sources of truth that can disagree or be partially
//! unavailable: a live billing provider feed, a manually maintained ledger of
//! revenue sources, and historical monthly snapshots.
//!
//! # Features
//!
//! - **Billing client**: cursor-paginated subscription fetch with cadence
//!   normalization to monthly-equivalent cents
//! - **Precedence chain**: live feed, then ledger, then a caller-supplied
//!   default - evaluated as an explicit, auditable tier list
//! - **Revalidation cache**: at most one upstream fetch per window per
//!   credential
//! - **Credential resolution**: operator-scoped override over a single
//!   injected process default
//! - **Snapshots**: per-month upserted history for trend display
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ledgerline::{self, ConfigBuilder, RevenueManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     ledgerline::init_tracing();
//!
//!     let config = ConfigBuilder::new()
//!         .from_env()
//!         .build();
//!
//!     // credential_store and ledger_store implement the CredentialStore
//!     // and LedgerStore traits against your own storage
//!     let manager = RevenueManager::from_config(credential_store, ledger_store, &config);
//!
//!     let revenue = manager.reconcile("op_42").await.unwrap();
//!     println!("MRR: {} cents ({})", revenue.mrr_cents, revenue.source.as_str());
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds where needed

pub mod billing;
pub mod cache;
mod config;
pub mod credentials;
mod error;
pub mod ledger;
pub mod revenue;
pub mod traits;
pub mod utils;

// Re-exports for public API
pub use billing::{
    fetch_live_monthly_total, BillingError, BillingInterval, LiveBillingClient,
    LiveBillingClientConfig, LiveRevenueTotal, SubscriptionFeed,
};
pub use cache::{InMemoryCache, NoOpCache};
pub use config::{
    ConfigBuilder, LoggingConfig, ProviderConfig, RevalidationConfig, RevenueConfig,
};
pub use credentials::{CredentialResolver, CredentialStore, BILLING_API_KEY};
pub use error::{ErrorContext, ErrorWithContext, LedgerlineError, Result};
pub use ledger::{
    average_growth, sum_active_ledger, LedgerStore, RevenueSnapshot, RevenueSource, SourceStatus,
};
pub use revenue::{
    CachedRevenueFeed, FeedProvider, LiveFeedProvider, MrrSource, ReconciledRevenue,
    RevenueManager,
};
pub use traits::cache::{Cache, CacheExt};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before constructing a `RevenueManager`.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "ledgerline=debug")
/// - `LEDGERLINE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("LEDGERLINE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &RevenueConfig) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
