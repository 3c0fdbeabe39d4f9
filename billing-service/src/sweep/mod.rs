//! Daily aging of unpaid bills, plus admin-driven bulk status changes.

use std::sync::Arc;

use billing_client::domain::{BillFilter, BillStatus};
use time::OffsetDateTime;

use crate::error::Result;
use crate::store::BillingStore;

/// Moves every pending bill on: zero-amount bills to paid, the rest to overdue
/// with their due amount recomputed. Runs as a single store statement, so it
/// either applies to all pending bills or to none.
pub struct OverdueSweep<S> {
    store: Arc<S>,
}

impl<S: BillingStore> OverdueSweep<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn run(&self, now: OffsetDateTime) -> Result<u64> {
        let swept = self.store.sweep_pending(now).await?;
        metrics::counter!("bills_swept_total").increment(swept);
        tracing::info!(swept, "overdue sweep finished");
        Ok(swept)
    }

    /// Apply `status` to every bill matching `filter`.
    pub async fn bulk_update_status(
        &self,
        filter: &BillFilter,
        status: BillStatus,
        now: OffsetDateTime,
    ) -> Result<u64> {
        let updated = self.store.bulk_update_status(filter, status, now).await?;
        tracing::info!(updated, status = %status, "bulk bill status update applied");
        Ok(updated)
    }
}
