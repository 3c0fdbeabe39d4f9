//! Chart payloads for consumption dashboards.

use std::sync::Arc;

use billing_client::domain::{AccessScope, AggregateRow};
use time::Date;

use crate::error::Result;
use crate::forecast::{month_axis, predict, ActualSeries, Forecast};
use crate::series::{
    date_key::{first_of_month, months_before, next_month},
    reconcile, ChartResponse, Granularity, OutputFormat, RawSample, SampleValue, Series,
    MONTHLY_LOOKBACK_MONTHS,
};
use crate::store::BillingStore;

fn to_samples(rows: Vec<AggregateRow>) -> Vec<RawSample> {
    rows.into_iter()
        .map(|r| RawSample::new(r.period_bucket, r.sum))
        .collect()
}

pub struct ConsumptionDashboard<S> {
    store: Arc<S>,
}

impl<S: BillingStore> ConsumptionDashboard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn reconciled(
        &self,
        meter_ids: &[String],
        granularity: Granularity,
        format: OutputFormat,
        since: Date,
        scope: &AccessScope,
        today: Date,
    ) -> Result<Series> {
        let (start, end) = match granularity {
            Granularity::Day => (since, today),
            Granularity::Month => {
                let current = first_of_month(today);
                let floor = months_before(current, MONTHLY_LOOKBACK_MONTHS);
                (since.max(floor), next_month(current).unwrap_or(today))
            }
        };

        let rows = self
            .store
            .aggregate_consumption(meter_ids, start, end, granularity, scope)
            .await?;

        reconcile(&to_samples(rows), granularity, format, today).map_err(|e| {
            metrics::counter!("series_reconcile_errors_total").increment(1);
            tracing::warn!(error = %e, granularity = granularity.as_bucket(), "series reconciliation failed");
            e
        })
    }

    /// Daily consumption from `since` through yesterday.
    pub async fn daily_series(
        &self,
        meter_ids: &[String],
        since: Date,
        scope: &AccessScope,
        today: Date,
    ) -> Result<ChartResponse> {
        let series = self
            .reconciled(meter_ids, Granularity::Day, OutputFormat::Display, since, scope, today)
            .await?;
        Ok(series.to_chart())
    }

    /// Monthly consumption from `since` (at most a year back) through the current month.
    pub async fn monthly_series(
        &self,
        meter_ids: &[String],
        since: Date,
        scope: &AccessScope,
        today: Date,
    ) -> Result<ChartResponse> {
        let series = self
            .reconciled(meter_ids, Granularity::Month, OutputFormat::Display, since, scope, today)
            .await?;
        Ok(series.to_chart())
    }

    /// This month's daily actuals for one meter, extended to month end.
    pub async fn consumer_forecast(
        &self,
        meter_serial: &str,
        scope: &AccessScope,
        today: Date,
    ) -> Result<Forecast> {
        let meters = [meter_serial.to_string()];
        let series = self
            .reconciled(
                &meters,
                Granularity::Day,
                OutputFormat::Canonical,
                first_of_month(today),
                scope,
                today,
            )
            .await?;

        let actual = ActualSeries {
            x_axis: series.dates,
            y_axis: series.values.into_iter().map(SampleValue::Number).collect(),
        };
        Ok(predict(&actual, &month_axis(today)))
    }
}
