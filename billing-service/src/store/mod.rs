//! The data-store seam the billing jobs and dashboards run against.

#[cfg(test)]
pub(crate) mod memory;
pub mod postgres;

use std::{future::Future, time::Duration};

use billing_client::domain::{
    AccessScope, AggregateRow, Bill, BillFilter, BillStatus, ConsumerAccount, ConsumptionTotal,
};
use time::{Date, OffsetDateTime};

use crate::error::{BillingError, Result};
use crate::series::Granularity;

pub use postgres::PgBillingStore;

/// Consumption aggregates and bill persistence.
///
/// Date ranges are half-open `[start, end)` calendar days in UTC.
#[async_trait::async_trait]
pub trait BillingStore: Send + Sync {
    async fn list_consumers(&self) -> Result<Vec<ConsumerAccount>>;

    async fn total_consumption(
        &self,
        meter_serial: &str,
        start: Date,
        end: Date,
        scope: &AccessScope,
    ) -> Result<ConsumptionTotal>;

    async fn aggregate_consumption(
        &self,
        meter_ids: &[String],
        start: Date,
        end: Date,
        granularity: Granularity,
        scope: &AccessScope,
    ) -> Result<Vec<AggregateRow>>;

    async fn bill_exists(
        &self,
        consumer_id: &str,
        meter_serial: &str,
        period_start: Date,
    ) -> Result<bool>;

    async fn latest_invoice_id(&self, prefix: &str) -> Result<Option<String>>;

    async fn insert_bill(&self, bill: &Bill) -> Result<()>;

    async fn sweep_pending(&self, now: OffsetDateTime) -> Result<u64>;

    async fn bulk_update_status(
        &self,
        filter: &BillFilter,
        status: BillStatus,
        now: OffsetDateTime,
    ) -> Result<u64>;
}

/// Run a store call under a deadline, surfacing expiry as [`BillingError::Timeout`].
pub async fn with_deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(BillingError::from),
        Err(_) => {
            metrics::counter!("store_timeouts_total", "op" => op).increment(1);
            tracing::warn!(op, timeout_secs = limit.as_secs(), "store call timed out");
            Err(BillingError::Timeout {
                elapsed_secs: limit.as_secs(),
            })
        }
    }
}
