//! Gap-filling of sparse consumption samples into dense, calendar-aligned series.

pub mod date_key;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::{BillingError, Result};
use date_key::{bucket_start, canonical_key, format_key, months_before, next_bucket, parse_date_key};

/// How far back a monthly series may reach, in months before the current one.
pub const MONTHLY_LOOKBACK_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Bucket name understood by the aggregate query.
    pub fn as_bucket(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `2024-01-05` / `2024-01`
    #[default]
    Canonical,
    /// `Jan 5, 2024` / `Jan 2024`
    Display,
}

/// A sample value as it arrives from the store or a chart payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Strict numeric coercion; text that is not a number is an error.
    pub fn coerce(&self) -> Result<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| BillingError::InvalidSample(format!("value '{s}' is not numeric")))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(BillingError::InvalidSample(format!("value {value} is not finite")))
        }
    }

    /// Lenient coercion: anything unparseable becomes NaN.
    pub fn to_f64_lossy(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub date_key: String,
    pub value: Option<SampleValue>,
}

impl RawSample {
    pub fn new(date_key: impl Into<String>, value: impl Into<SampleValue>) -> Self {
        Self {
            date_key: date_key.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date_key: String,
    pub value: f64,
}

/// A dense series: `dates[i]` pairs with `values[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn points(&self) -> Vec<SeriesPoint> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(d, v)| SeriesPoint {
                date_key: d.clone(),
                value: *v,
            })
            .collect()
    }

    pub fn to_samples(&self) -> Vec<RawSample> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(d, v)| RawSample::new(d.clone(), *v))
            .collect()
    }

    pub fn to_chart(&self) -> ChartResponse {
        ChartResponse {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| format!("{v:.2}")).collect(),
        }
    }
}

/// Dashboard payload: display dates with values fixed to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartResponse {
    pub dates: Vec<String>,
    pub values: Vec<String>,
}

impl ChartResponse {
    pub fn to_samples(&self) -> Vec<RawSample> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(d, v)| RawSample::new(d.clone(), SampleValue::Text(v.clone())))
            .collect()
    }
}

/// Reconcile sparse samples into one value per calendar bucket.
///
/// The range runs from the earliest sample's bucket to yesterday (day
/// granularity) or the current month (month granularity, at most
/// [`MONTHLY_LOOKBACK_MONTHS`] back). Missing buckets read `0.0`; samples that
/// share a bucket are summed. Any malformed sample fails the whole call.
pub fn reconcile(
    samples: &[RawSample],
    granularity: Granularity,
    format: OutputFormat,
    today: Date,
) -> Result<Series> {
    let mut parsed = samples
        .iter()
        .map(|s| {
            let date = parse_date_key(&s.date_key)?;
            let value = s
                .value
                .as_ref()
                .ok_or_else(|| BillingError::InvalidSample(format!("missing value for '{}'", s.date_key)))?
                .coerce()?;
            Ok((date, value))
        })
        .collect::<Result<Vec<(Date, f64)>>>()?;

    parsed.sort_by_key(|(date, _)| *date);

    let Some(&(earliest, _)) = parsed.first() else {
        return Ok(Series::default());
    };

    let mut start = bucket_start(earliest, granularity);
    let end = match granularity {
        Granularity::Day => match today.previous_day() {
            Some(yesterday) => yesterday,
            None => return Ok(Series::default()),
        },
        Granularity::Month => {
            let current = bucket_start(today, Granularity::Month);
            start = start.max(months_before(current, MONTHLY_LOOKBACK_MONTHS));
            current
        }
    };

    let mut lookup: HashMap<String, f64> = HashMap::with_capacity(parsed.len());
    for (date, value) in &parsed {
        *lookup.entry(canonical_key(*date, granularity)).or_insert(0.0) += value;
    }

    let mut series = Series::default();
    let mut cursor = Some(start);
    while let Some(bucket) = cursor {
        if bucket > end {
            break;
        }
        let value = lookup
            .get(&canonical_key(bucket, granularity))
            .copied()
            .unwrap_or(0.0);
        series.dates.push(format_key(bucket, granularity, format)?);
        series.values.push(value);
        cursor = next_bucket(bucket, granularity);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn samples(pairs: &[(&str, f64)]) -> Vec<RawSample> {
        pairs.iter().map(|(d, v)| RawSample::new(*d, *v)).collect()
    }

    #[test]
    fn fills_daily_gaps_up_to_last_complete_day() {
        let input = samples(&[("Jan 1, 2024", 5.0), ("Jan 3, 2024", 7.0)]);
        let series = reconcile(&input, Granularity::Day, OutputFormat::Display, date!(2024 - 01 - 05)).unwrap();
        assert_eq!(series.dates, vec!["Jan 1, 2024", "Jan 2, 2024", "Jan 3, 2024", "Jan 4, 2024"]);
        assert_eq!(series.values, vec![5.0, 0.0, 7.0, 0.0]);
    }

    #[test]
    fn today_is_excluded_from_daily_series() {
        let input = samples(&[("2024-01-01", 5.0), ("2024-01-04", 9.0)]);
        let series = reconcile(&input, Granularity::Day, OutputFormat::Canonical, date!(2024 - 01 - 04)).unwrap();
        assert_eq!(series.dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(series.values, vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn samples_sharing_a_bucket_are_summed() {
        let input = samples(&[("2024-01-02", 1.5), ("Jan 2, 2024", 2.5), ("2024-01-01", 4.0)]);
        let series = reconcile(&input, Granularity::Day, OutputFormat::Canonical, date!(2024 - 01 - 04)).unwrap();
        assert_eq!(series.dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(series.values, vec![4.0, 4.0, 0.0]);

        let monthly = samples(&[("2024-03-05", 1.0), ("2024-03-20", 2.0)]);
        let series = reconcile(&monthly, Granularity::Month, OutputFormat::Canonical, date!(2024 - 03 - 25)).unwrap();
        assert_eq!(series.dates, vec!["2024-03"]);
        assert_eq!(series.values, vec![3.0]);
    }

    #[test]
    fn daily_length_counts_every_day_through_yesterday() {
        let today = date!(2024 - 03 - 10);
        let first = date!(2024 - 02 - 20);
        let input = samples(&[("2024-03-01", 1.0), ("2024-02-20", 2.0)]);
        let series = reconcile(&input, Granularity::Day, OutputFormat::Canonical, today).unwrap();
        let yesterday = today.previous_day().unwrap();
        assert_eq!(series.len() as i64, (yesterday - first).whole_days() + 1);
        // 2024 is a leap year, so Feb 29 must be present
        assert!(series.dates.contains(&"2024-02-29".to_string()));
    }

    #[test]
    fn input_order_does_not_matter() {
        let today = date!(2024 - 01 - 10);
        let sorted = samples(&[("2024-01-02", 1.0), ("2024-01-05", 2.0), ("2024-01-07", 3.0)]);
        let shuffled = samples(&[("2024-01-07", 3.0), ("2024-01-02", 1.0), ("2024-01-05", 2.0)]);
        assert_eq!(
            reconcile(&sorted, Granularity::Day, OutputFormat::Canonical, today).unwrap(),
            reconcile(&shuffled, Granularity::Day, OutputFormat::Canonical, today).unwrap(),
        );
    }

    #[test]
    fn dates_compare_chronologically_not_lexically() {
        // "Feb" < "Jan" lexically; the series must still start in January.
        let input = samples(&[("Feb 1, 2024", 2.0), ("Jan 31, 2024", 1.0)]);
        let series = reconcile(&input, Granularity::Day, OutputFormat::Display, date!(2024 - 02 - 02)).unwrap();
        assert_eq!(series.dates, vec!["Jan 31, 2024", "Feb 1, 2024"]);
        assert_eq!(series.values, vec![1.0, 2.0]);
    }

    #[test]
    fn reconciling_twice_changes_nothing() {
        let today = date!(2024 - 06 - 15);
        let input = samples(&[("2024-06-01", 3.5), ("2024-06-09", 1.25), ("2024-06-11", 0.0)]);
        for format in [OutputFormat::Canonical, OutputFormat::Display] {
            let once = reconcile(&input, Granularity::Day, format, today).unwrap();
            let twice = reconcile(&once.to_samples(), Granularity::Day, format, today).unwrap();
            assert_eq!(once, twice);

            let via_chart = reconcile(&once.to_chart().to_samples(), Granularity::Day, format, today).unwrap();
            assert_eq!(once, via_chart);
        }
    }

    #[test]
    fn monthly_series_runs_to_current_month() {
        let input = samples(&[("2024-01", 10.0), ("2024-03-17", 4.0), ("2024-03-02", 6.0)]);
        let series = reconcile(&input, Granularity::Month, OutputFormat::Canonical, date!(2024 - 05 - 20)).unwrap();
        assert_eq!(series.dates, vec!["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"]);
        assert_eq!(series.values, vec![10.0, 0.0, 10.0, 0.0, 0.0]);
    }

    #[test]
    fn monthly_lookback_is_clamped_to_twelve_months() {
        let input = samples(&[("2020-01", 1.0), ("2024-02", 2.0)]);
        let series = reconcile(&input, Granularity::Month, OutputFormat::Display, date!(2024 - 05 - 20)).unwrap();
        assert_eq!(series.len(), 13);
        assert_eq!(series.dates.first().map(String::as_str), Some("May 2023"));
        assert_eq!(series.dates.last().map(String::as_str), Some("May 2024"));
        assert_eq!(series.values.iter().sum::<f64>(), 2.0);
    }

    #[test]
    fn text_values_are_coerced() {
        let input = vec![RawSample::new("2024-01-01", SampleValue::Text(" 12.50 ".to_string()))];
        let series = reconcile(&input, Granularity::Day, OutputFormat::Canonical, date!(2024 - 01 - 02)).unwrap();
        assert_eq!(series.values, vec![12.5]);
    }

    #[test]
    fn malformed_input_aborts_reconciliation() {
        let today = date!(2024 - 01 - 10);
        let bad_date = samples(&[("2024-01-01", 1.0), ("yesterday", 2.0)]);
        assert!(matches!(
            reconcile(&bad_date, Granularity::Day, OutputFormat::Canonical, today),
            Err(BillingError::InvalidDate(_))
        ));

        let missing_value = vec![RawSample {
            date_key: "2024-01-01".to_string(),
            value: None,
        }];
        assert!(matches!(
            reconcile(&missing_value, Granularity::Day, OutputFormat::Canonical, today),
            Err(BillingError::InvalidSample(_))
        ));

        let bad_value = vec![RawSample::new("2024-01-01", SampleValue::Text("n/a".to_string()))];
        assert!(reconcile(&bad_value, Granularity::Day, OutputFormat::Canonical, today).is_err());
    }

    #[test]
    fn empty_input_gives_empty_series() {
        let series = reconcile(&[], Granularity::Day, OutputFormat::Canonical, date!(2024 - 01 - 10)).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn chart_values_use_two_decimals() {
        let input = samples(&[("2024-01-01", 5.0), ("2024-01-02", 1.234)]);
        let chart = reconcile(&input, Granularity::Day, OutputFormat::Canonical, date!(2024 - 01 - 03))
            .unwrap()
            .to_chart();
        assert_eq!(chart.values, vec!["5.00", "1.23"]);
    }
}
