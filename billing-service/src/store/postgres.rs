use std::time::Duration;

use billing_client::{
    db::{bill_queries, consumption_queries},
    domain::{AccessScope, AggregateRow, Bill, BillFilter, BillStatus, ConsumerAccount, ConsumptionTotal},
};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use super::{with_deadline, BillingStore};
use crate::error::Result;
use crate::series::Granularity;

fn day_start(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

/// [`BillingStore`] over the Postgres wire protocol, every call bounded by
/// `query_timeout`.
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgBillingStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }
}

#[async_trait::async_trait]
impl BillingStore for PgBillingStore {
    async fn list_consumers(&self) -> Result<Vec<ConsumerAccount>> {
        with_deadline(
            "list_consumers",
            self.query_timeout,
            consumption_queries::list_consumers(&self.pool),
        )
        .await
    }

    async fn total_consumption(
        &self,
        meter_serial: &str,
        start: Date,
        end: Date,
        scope: &AccessScope,
    ) -> Result<ConsumptionTotal> {
        with_deadline(
            "total_consumption",
            self.query_timeout,
            consumption_queries::total_consumption(
                &self.pool,
                meter_serial,
                day_start(start),
                day_start(end),
                scope,
            ),
        )
        .await
    }

    async fn aggregate_consumption(
        &self,
        meter_ids: &[String],
        start: Date,
        end: Date,
        granularity: Granularity,
        scope: &AccessScope,
    ) -> Result<Vec<AggregateRow>> {
        with_deadline(
            "aggregate_consumption",
            self.query_timeout,
            consumption_queries::aggregate_consumption(
                &self.pool,
                meter_ids,
                day_start(start),
                day_start(end),
                granularity.as_bucket(),
                scope,
            ),
        )
        .await
    }

    async fn bill_exists(
        &self,
        consumer_id: &str,
        meter_serial: &str,
        period_start: Date,
    ) -> Result<bool> {
        with_deadline(
            "bill_exists",
            self.query_timeout,
            bill_queries::bill_exists(&self.pool, consumer_id, meter_serial, period_start),
        )
        .await
    }

    async fn latest_invoice_id(&self, prefix: &str) -> Result<Option<String>> {
        with_deadline(
            "latest_invoice_id",
            self.query_timeout,
            bill_queries::latest_invoice_id(&self.pool, prefix),
        )
        .await
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<()> {
        with_deadline(
            "insert_bill",
            self.query_timeout,
            bill_queries::insert_bill(&self.pool, bill),
        )
        .await
    }

    async fn sweep_pending(&self, now: OffsetDateTime) -> Result<u64> {
        with_deadline(
            "sweep_pending",
            self.query_timeout,
            bill_queries::sweep_pending(&self.pool, now),
        )
        .await
    }

    async fn bulk_update_status(
        &self,
        filter: &BillFilter,
        status: BillStatus,
        now: OffsetDateTime,
    ) -> Result<u64> {
        with_deadline(
            "bulk_update_status",
            self.query_timeout,
            bill_queries::bulk_update_status(&self.pool, filter, status, now),
        )
        .await
    }
}
