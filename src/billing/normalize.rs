//! Billing cadence normalization.
//!
//! The provider bills on arbitrary cadences (every N days/weeks/months/years,
//! with a quantity per line item). Reconciliation needs everything on one
//! axis: monthly-equivalent cents.

use super::feed::{BillingInterval, SubscriptionItem};

/// Average weeks per month used for weekly cadences.
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Days per month used for daily cadences.
pub const DAYS_PER_MONTH: f64 = 30.0;

const MONTHS_PER_YEAR: f64 = 12.0;

/// Normalize one billed line item to monthly-equivalent cents.
///
/// `unit_amount * quantity` is scaled by the cadence, then rounded once to
/// the nearest cent (half away from zero). A non-positive `interval_count`
/// is clamped to 1 rather than dividing by zero; the provider contract says
/// it is positive.
#[must_use]
pub fn monthly_equivalent_cents(item: &SubscriptionItem) -> i64 {
    normalize(
        item.price.unit_amount,
        item.quantity,
        item.price.recurring.interval,
        item.price.recurring.interval_count,
    )
}

fn normalize(unit_amount: i64, quantity: i64, interval: BillingInterval, interval_count: i64) -> i64 {
    let raw = (unit_amount * quantity) as f64;
    let count = interval_count.max(1) as f64;

    let monthly = match interval {
        BillingInterval::Month => raw / count,
        BillingInterval::Year => raw / MONTHS_PER_YEAR / count,
        BillingInterval::Week => raw * WEEKS_PER_MONTH / count,
        BillingInterval::Day => raw * DAYS_PER_MONTH / count,
    };

    monthly.round() as i64
}
