//! Short-horizon projection of a partially observed daily series.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::series::{
    date_key::{canonical_key, first_of_month, next_month},
    Granularity, SampleValue,
};

/// Number of most recent valid observations the trend line is fitted on.
pub const REGRESSION_WINDOW: usize = 14;

/// Observed chart series: `x_axis[i]` pairs with `y_axis[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualSeries {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<SampleValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date_key: String,
    pub value: f64,
    pub is_actual: bool,
}

/// Blended series over the target axis. `actual_data` and `predicted_data`
/// hold a value only where the point is of that kind, for two-line charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<f64>,
    pub actual_data: Vec<Option<f64>>,
    pub predicted_data: Vec<Option<f64>>,
}

impl Forecast {
    pub fn points(&self) -> Vec<ForecastPoint> {
        self.x_axis
            .iter()
            .zip(&self.y_axis)
            .zip(&self.actual_data)
            .map(|((d, v), a)| ForecastPoint {
                date_key: d.clone(),
                value: *v,
                is_actual: a.is_some(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrendLine {
    slope: f64,
    intercept: f64,
}

/// Ordinary least squares over `(index, value)`.
///
/// Fewer than two points cannot define a slope: one point yields a flat line
/// at that value, none yields a flat line at zero.
fn fit_trend(values: &[f64]) -> TrendLine {
    match values {
        [] => TrendLine {
            slope: 0.0,
            intercept: 0.0,
        },
        [only] => TrendLine {
            slope: 0.0,
            intercept: *only,
        },
        _ => {
            let n = values.len() as f64;
            let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
            let sum_y: f64 = values.iter().sum();
            let sum_xx: f64 = (0..values.len()).map(|i| (i * i) as f64).sum();
            let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();

            let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
            let intercept = (sum_y - slope * sum_x) / n;
            TrendLine { slope, intercept }
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Project `actual` onto `target_dates`.
///
/// Target dates present in `actual.x_axis` with a numeric value pass through
/// unchanged. Every other date is predicted from a trend line fitted on the
/// last [`REGRESSION_WINDOW`] non-zero observations, floored at zero and
/// rounded to two decimals.
pub fn predict(actual: &ActualSeries, target_dates: &[String]) -> Forecast {
    let coerced: Vec<f64> = actual.y_axis.iter().map(SampleValue::to_f64_lossy).collect();

    let valid: Vec<f64> = coerced
        .iter()
        .copied()
        .filter(|v| !v.is_nan() && *v != 0.0)
        .collect();
    let window = &valid[valid.len().saturating_sub(REGRESSION_WINDOW)..];
    let trend = fit_trend(window);

    let observed: HashMap<&str, f64> = actual
        .x_axis
        .iter()
        .map(String::as_str)
        .zip(coerced.iter().copied())
        .collect();
    let last_actual_index = actual.x_axis.len() as i64 - 1;

    let mut forecast = Forecast::default();
    for (i, date) in target_dates.iter().enumerate() {
        forecast.x_axis.push(date.clone());

        match observed.get(date.as_str()) {
            Some(value) if !value.is_nan() => {
                forecast.y_axis.push(*value);
                forecast.actual_data.push(Some(*value));
                forecast.predicted_data.push(None);
            }
            _ => {
                let days_from_last_actual = i as i64 - last_actual_index;
                let x = window.len() as f64 + days_from_last_actual as f64;
                let predicted = round2((trend.intercept + trend.slope * x).max(0.0));
                forecast.y_axis.push(predicted);
                forecast.actual_data.push(None);
                forecast.predicted_data.push(Some(predicted));
            }
        }
    }

    forecast
}

/// Every day of the month containing `today`, as canonical day keys.
pub fn month_axis(today: Date) -> Vec<String> {
    let start = first_of_month(today);
    let end = next_month(start);

    let mut axis = Vec::with_capacity(31);
    let mut cursor = Some(start);
    while let Some(day) = cursor {
        if Some(day) == end {
            break;
        }
        axis.push(canonical_key(day, Granularity::Day));
        cursor = day.next_day();
    }
    axis
}
