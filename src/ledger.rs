//! Manually maintained revenue ledger.
//!
//! Entities and aggregation for the operator's hand-tracked revenue sources
//! and their monthly snapshots. Amounts are integer cents throughout; the
//! engine never stores currency as floats. Rows are created and edited by the
//! CRUD surface that owns the backing store - this module only reads them,
//! plus the snapshot upsert used for trend history.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a revenue source.
///
/// Only `Active` sources contribute to the ledger sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Paused,
    Closed,
}

impl SourceStatus {
    /// String form as stored by the ledger schema.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Closed => "closed",
        }
    }

    /// Parse from the stored string form. Unknown values are treated as
    /// `Closed` so a bad row can never inflate the sum.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "paused" => Self::Paused,
            _ => Self::Closed,
        }
    }
}

/// A named revenue source in the operator's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSource {
    pub id: Uuid,
    pub operator_id: String,
    pub name: String,
    /// Free-form type tag ("saas", "consulting", ...)
    pub category: String,
    /// Monthly value in currency minor units. Non-negative.
    pub monthly_value_cents: i64,
    /// Month-over-month growth in percent. May be negative or zero.
    pub growth_percent: i32,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RevenueSource {
    /// Create an active source with a fresh id.
    pub fn new(
        operator_id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        monthly_value_cents: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            operator_id: operator_id.into(),
            name: name.into(),
            category: category.into(),
            monthly_value_cents,
            growth_percent: 0,
            status: SourceStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the status (builder style).
    #[must_use]
    pub fn with_status(mut self, status: SourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the growth percentage (builder style).
    #[must_use]
    pub fn with_growth(mut self, growth_percent: i32) -> Self {
        self.growth_percent = growth_percent;
        self
    }
}

/// One month of recorded totals, unique per operator per month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSnapshot {
    pub operator_id: String,
    /// Year-month key, "YYYY-MM".
    pub month: String,
    pub total_mrr_cents: i64,
    pub expenses_cents: i64,
}

/// Format a timestamp as a "YYYY-MM" month key.
#[must_use]
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Month key for the current month.
#[must_use]
pub fn current_month_key() -> String {
    month_key(Utc::now())
}

/// Sum monthly value across active sources.
///
/// Pure and total: paused and closed sources are excluded, an empty ledger
/// sums to 0.
#[must_use]
pub fn sum_active_ledger(sources: &[RevenueSource]) -> i64 {
    sources
        .iter()
        .filter(|s| s.status == SourceStatus::Active)
        .map(|s| s.monthly_value_cents)
        .sum()
}

/// Arithmetic mean of growth percent across active sources, rounded to the
/// nearest integer. 0 when no source is active.
#[must_use]
pub fn average_growth(sources: &[RevenueSource]) -> i32 {
    let growths: Vec<i64> = sources
        .iter()
        .filter(|s| s.status == SourceStatus::Active)
        .map(|s| i64::from(s.growth_percent))
        .collect();

    if growths.is_empty() {
        return 0;
    }

    let sum: i64 = growths.iter().sum();
    (sum as f64 / growths.len() as f64).round() as i32
}

/// Trait for the ledger store collaborator.
///
/// Implement this against the store that owns `revenue_sources` and
/// `revenue_snapshots`. An in-memory implementation is provided for testing.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All revenue sources for an operator, any status.
    async fn sources_for(&self, operator_id: &str) -> Result<Vec<RevenueSource>>;

    /// The most recent snapshot by month key, if any.
    async fn latest_snapshot(&self, operator_id: &str) -> Result<Option<RevenueSnapshot>>;

    /// All snapshots for an operator, ascending by month.
    async fn snapshot_history(&self, operator_id: &str) -> Result<Vec<RevenueSnapshot>>;

    /// Insert or replace the snapshot for `(operator_id, month)`.
    async fn upsert_snapshot(&self, snapshot: &RevenueSnapshot) -> Result<()>;
}

#[cfg(any(test, feature = "test-revenue"))]
pub mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    /// In-memory ledger store for testing.
    #[derive(Default, Clone)]
    pub struct InMemoryLedgerStore {
        sources: Arc<RwLock<Vec<RevenueSource>>>,
        snapshots: Arc<RwLock<HashMap<(String, String), RevenueSnapshot>>>,
    }

    impl InMemoryLedgerStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a source row.
        pub fn add_source(&self, source: RevenueSource) {
            self.sources.write().unwrap().push(source);
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        async fn sources_for(&self, operator_id: &str) -> Result<Vec<RevenueSource>> {
            Ok(self
                .sources
                .read()
                .unwrap()
                .iter()
                .filter(|s| s.operator_id == operator_id)
                .cloned()
                .collect())
        }

        async fn latest_snapshot(&self, operator_id: &str) -> Result<Option<RevenueSnapshot>> {
            let history = self.snapshot_history(operator_id).await?;
            Ok(history.into_iter().next_back())
        }

        async fn snapshot_history(&self, operator_id: &str) -> Result<Vec<RevenueSnapshot>> {
            let mut history: Vec<RevenueSnapshot> = self
                .snapshots
                .read()
                .unwrap()
                .values()
                .filter(|s| s.operator_id == operator_id)
                .cloned()
                .collect();
            // "YYYY-MM" sorts chronologically as a string
            history.sort_by(|a, b| a.month.cmp(&b.month));
            Ok(history)
        }

        async fn upsert_snapshot(&self, snapshot: &RevenueSnapshot) -> Result<()> {
            self.snapshots.write().unwrap().insert(
                (snapshot.operator_id.clone(), snapshot.month.clone()),
                snapshot.clone(),
            );
            Ok(())
        }
    }
}
