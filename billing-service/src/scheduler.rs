//! Timers for the monthly invoice run and the daily overdue sweep.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use time::{Date, OffsetDateTime};

use crate::alerts::AlertTracker;
use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::invoice::{InvoiceGenerator, InvoiceRunSummary};
use crate::series::date_key::first_of_month;
use crate::store::BillingStore;
use crate::sweep::OverdueSweep;

/// Invoices are owed once per month, from `hour` UTC on the 1st onwards.
/// `last_cycle` is the bill date of the last completed run.
pub fn is_invoice_due(last_cycle: Option<Date>, now: OffsetDateTime, hour: u8) -> bool {
    let cycle = first_of_month(now.date());
    if last_cycle == Some(cycle) {
        return false;
    }
    now.date() > cycle || now.hour() >= hour
}

/// The sweep is owed once per day, from `hour` UTC onwards.
pub fn is_sweep_due(last_run: Option<Date>, now: OffsetDateTime, hour: u8) -> bool {
    last_run != Some(now.date()) && now.hour() >= hour
}

pub struct Scheduler<S> {
    invoices: InvoiceGenerator<S>,
    sweep: OverdueSweep<S>,
    schedule: ScheduleConfig,
    // Each lock guards one job and remembers when it last completed.
    invoice_state: tokio::sync::Mutex<Option<Date>>,
    sweep_state: tokio::sync::Mutex<Option<Date>>,
    alerts: Mutex<AlertTracker>,
}

impl<S: BillingStore> Scheduler<S> {
    pub fn new(
        invoices: InvoiceGenerator<S>,
        sweep: OverdueSweep<S>,
        schedule: ScheduleConfig,
        alerts: AlertTracker,
    ) -> Self {
        Self {
            invoices,
            sweep,
            schedule,
            invoice_state: tokio::sync::Mutex::new(None),
            sweep_state: tokio::sync::Mutex::new(None),
            alerts: Mutex::new(alerts),
        }
    }

    /// Drive both jobs forever on independent timers.
    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.schedule.tick_secs,
            invoice_hour_utc = self.schedule.invoice_hour_utc,
            sweep_hour_utc = self.schedule.sweep_hour_utc,
            "scheduler started"
        );
        tokio::join!(self.invoice_loop(), self.sweep_loop());
    }

    async fn invoice_loop(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.schedule.tick_secs.max(1)));
        loop {
            ticker.tick().await;
            self.tick_invoices(OffsetDateTime::now_utc()).await;
        }
    }

    async fn sweep_loop(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.schedule.tick_secs.max(1)));
        loop {
            ticker.tick().await;
            self.tick_sweep(OffsetDateTime::now_utc()).await;
        }
    }

    fn report<T>(&self, job: &'static str, outcome: &Result<T>, now: OffsetDateTime) {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        alerts.report(job, outcome, now);
    }

    /// Run the invoice job if it is owed. Returns `None` when nothing ran,
    /// either because no cycle is owed or another run holds the job.
    pub async fn tick_invoices(&self, now: OffsetDateTime) -> Option<Result<InvoiceRunSummary>> {
        let Ok(mut last_cycle) = self.invoice_state.try_lock() else {
            tracing::warn!("invoice run already in progress, skipping trigger");
            return None;
        };
        if !is_invoice_due(*last_cycle, now, self.schedule.invoice_hour_utc) {
            return None;
        }

        let started = Instant::now();
        let outcome = self.invoices.run(now).await;
        metrics::histogram!("job_duration_seconds", "job" => "invoices")
            .record(started.elapsed().as_secs_f64());

        if outcome.is_ok() {
            *last_cycle = Some(first_of_month(now.date()));
        }
        self.report("invoices", &outcome, now);
        Some(outcome)
    }

    /// Run the overdue sweep if it is owed today.
    pub async fn tick_sweep(&self, now: OffsetDateTime) -> Option<Result<u64>> {
        let Ok(mut last_run) = self.sweep_state.try_lock() else {
            tracing::warn!("overdue sweep already in progress, skipping trigger");
            return None;
        };
        if !is_sweep_due(*last_run, now, self.schedule.sweep_hour_utc) {
            return None;
        }

        let started = Instant::now();
        let outcome = self.sweep.run(now).await;
        metrics::histogram!("job_duration_seconds", "job" => "sweep")
            .record(started.elapsed().as_secs_f64());

        if outcome.is_ok() {
            *last_run = Some(now.date());
        }
        self.report("sweep", &outcome, now);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::tariff::{TariffEngine, TariffPolicy};
    use billing_client::domain::ConsumerAccount;
    use std::sync::Arc;
    use time::macros::{date, datetime};

    fn scheduler(store: Arc<MemoryStore>) -> Scheduler<MemoryStore> {
        Scheduler::new(
            InvoiceGenerator::new(store.clone(), TariffEngine::new(TariffPolicy::Flat, vec![])),
            OverdueSweep::new(store),
            ScheduleConfig {
                tick_secs: 60,
                invoice_hour_utc: 2,
                sweep_hour_utc: 3,
            },
            AlertTracker::new(Duration::from_secs(3600)),
        )
    }

    fn consumer(meter: &str) -> ConsumerAccount {
        ConsumerAccount {
            meter_serial: meter.to_string(),
            consumer_uid: format!("c-{meter}"),
            consumer_category: "domestic".to_string(),
        }
    }

    #[test]
    fn invoice_due_from_configured_hour_on_the_first() {
        assert!(!is_invoice_due(None, datetime!(2024-03-01 01:59:00 UTC), 2));
        assert!(is_invoice_due(None, datetime!(2024-03-01 02:00:00 UTC), 2));
        assert!(!is_invoice_due(
            Some(date!(2024 - 03 - 01)),
            datetime!(2024-03-01 05:00:00 UTC),
            2
        ));
        // catch up when the 1st was missed
        assert!(is_invoice_due(
            Some(date!(2024 - 02 - 01)),
            datetime!(2024-03-04 00:00:00 UTC),
            2
        ));
    }

    #[test]
    fn sweep_due_once_per_day() {
        assert!(!is_sweep_due(None, datetime!(2024-03-10 02:00:00 UTC), 3));
        assert!(is_sweep_due(None, datetime!(2024-03-10 03:00:00 UTC), 3));
        assert!(!is_sweep_due(
            Some(date!(2024 - 03 - 10)),
            datetime!(2024-03-10 23:00:00 UTC),
            3
        ));
        assert!(is_sweep_due(
            Some(date!(2024 - 03 - 10)),
            datetime!(2024-03-11 03:00:00 UTC),
            3
        ));
    }

    #[tokio::test]
    async fn invoice_tick_runs_once_per_cycle() {
        let store = Arc::new(MemoryStore::with_consumers(vec![consumer("m-1")]));
        let scheduler = scheduler(store.clone());

        assert!(scheduler.tick_invoices(datetime!(2024-03-01 01:00:00 UTC)).await.is_none());
        let first = scheduler.tick_invoices(datetime!(2024-03-01 02:01:00 UTC)).await;
        assert_eq!(first.unwrap().unwrap().generated, 1);
        assert!(scheduler.tick_invoices(datetime!(2024-03-01 02:02:00 UTC)).await.is_none());
        assert_eq!(store.bills().len(), 1);
    }

    #[tokio::test]
    async fn failed_invoice_run_is_retried_next_tick() {
        let mut store = MemoryStore::with_consumers(vec![consumer("m-1")]);
        store.failing_meter = Some("m-1".to_string());
        let scheduler = scheduler(Arc::new(store));

        let now = datetime!(2024-03-01 02:01:00 UTC);
        assert!(scheduler.tick_invoices(now).await.unwrap().is_err());
        assert!(scheduler.tick_invoices(now).await.unwrap().is_err());
    }

    #[tokio::test]
    async fn busy_job_skips_overlapping_trigger() {
        let store = Arc::new(MemoryStore::default());
        let scheduler = scheduler(store);

        let _held = scheduler.sweep_state.lock().await;
        assert!(scheduler.tick_sweep(datetime!(2024-03-10 04:00:00 UTC)).await.is_none());
    }

    #[tokio::test]
    async fn sweep_tick_runs_daily() {
        let store = Arc::new(MemoryStore::default());
        let scheduler = scheduler(store);

        let now = datetime!(2024-03-10 04:00:00 UTC);
        assert_eq!(scheduler.tick_sweep(now).await.unwrap().unwrap(), 0);
        assert!(scheduler.tick_sweep(now).await.is_none());
        assert!(scheduler
            .tick_sweep(datetime!(2024-03-11 04:00:00 UTC))
            .await
            .is_some());
    }
}
