use std::{collections::HashMap, sync::Mutex};

use billing_client::domain::{
    AccessScope, AggregateRow, Bill, BillFilter, BillStatus, ConsumerAccount, ConsumptionTotal,
};
use time::{Date, OffsetDateTime};

use super::BillingStore;
use crate::error::{BillingError, Result};
use crate::series::Granularity;

/// In-process fake used by the job and dashboard tests.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub consumers: Vec<ConsumerAccount>,
    /// meter serial → kWh for any requested window
    pub totals: HashMap<String, f64>,
    pub aggregates: Vec<AggregateRow>,
    /// consumer id → category, for bulk-update filtering
    pub categories: HashMap<String, String>,
    pub failing_meter: Option<String>,
    pub bills: Mutex<Vec<Bill>>,
    pub consumption_windows: Mutex<Vec<(String, Date, Date)>>,
    pub aggregate_calls: Mutex<Vec<(Date, Date, Granularity)>>,
    pub scopes_seen: Mutex<Vec<AccessScope>>,
}

impl MemoryStore {
    pub fn with_consumers(consumers: Vec<ConsumerAccount>) -> Self {
        let categories = consumers
            .iter()
            .map(|c| (c.consumer_uid.clone(), c.consumer_category.clone()))
            .collect();
        Self {
            consumers,
            categories,
            ..Default::default()
        }
    }

    pub fn bills(&self) -> Vec<Bill> {
        self.bills.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BillingStore for MemoryStore {
    async fn list_consumers(&self) -> Result<Vec<ConsumerAccount>> {
        Ok(self.consumers.clone())
    }

    async fn total_consumption(
        &self,
        meter_serial: &str,
        start: Date,
        end: Date,
        scope: &AccessScope,
    ) -> Result<ConsumptionTotal> {
        self.scopes_seen.lock().unwrap().push(scope.clone());
        if self.failing_meter.as_deref() == Some(meter_serial) {
            return Err(BillingError::Store(anyhow::anyhow!("aggregate failed for {meter_serial}")));
        }
        self.consumption_windows
            .lock()
            .unwrap()
            .push((meter_serial.to_string(), start, end));

        let sum = self.totals.get(meter_serial).copied().unwrap_or(0.0);
        Ok(ConsumptionTotal {
            count: i64::from(sum > 0.0),
            sum,
        })
    }

    async fn aggregate_consumption(
        &self,
        _meter_ids: &[String],
        start: Date,
        end: Date,
        granularity: Granularity,
        _scope: &AccessScope,
    ) -> Result<Vec<AggregateRow>> {
        self.aggregate_calls.lock().unwrap().push((start, end, granularity));
        Ok(self.aggregates.clone())
    }

    async fn bill_exists(
        &self,
        consumer_id: &str,
        meter_serial: &str,
        period_start: Date,
    ) -> Result<bool> {
        Ok(self.bills.lock().unwrap().iter().any(|b| {
            b.consumer_id == consumer_id
                && b.meter_serial == meter_serial
                && b.period_start == period_start
        }))
    }

    async fn latest_invoice_id(&self, prefix: &str) -> Result<Option<String>> {
        Ok(self
            .bills
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.invoice_id.clone())
            .filter(|id| id.starts_with(prefix))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b))))
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<()> {
        let mut bills = self.bills.lock().unwrap();
        if bills.iter().any(|b| b.invoice_id == bill.invoice_id) {
            return Err(BillingError::Store(anyhow::anyhow!(
                "duplicate invoice id {}",
                bill.invoice_id
            )));
        }
        bills.push(bill.clone());
        Ok(())
    }

    async fn sweep_pending(&self, now: OffsetDateTime) -> Result<u64> {
        let mut bills = self.bills.lock().unwrap();
        let mut touched = 0;
        for bill in bills.iter_mut() {
            if bill.age(now) {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn bulk_update_status(
        &self,
        filter: &BillFilter,
        status: BillStatus,
        now: OffsetDateTime,
    ) -> Result<u64> {
        let mut bills = self.bills.lock().unwrap();
        let mut touched = 0;
        for bill in bills.iter_mut() {
            let category = self.categories.get(&bill.consumer_id).map(String::as_str);
            if filter.matches(bill, category) {
                bill.set_status(status, now);
                touched += 1;
            }
        }
        Ok(touched)
    }
}
