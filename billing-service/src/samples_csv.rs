use std::{io::Read, path::Path};

use billing_client::domain::ConsumptionSample;
use csv::StringRecord;

use crate::error::{BillingError, Result};
use crate::series::{RawSample, SampleValue};

/// Consumption samples from CSV.
///
/// Expected header columns (by name):
/// - period_key (day or month key)
/// - quantity
/// - meter_id (optional)
fn record_to_sample(record: &StringRecord, headers: &StringRecord) -> Result<ConsumptionSample> {
    let get = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
    };

    let period_key = get("period_key")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BillingError::InvalidSample("missing column 'period_key' in CSV record".to_string()))?;
    let quantity_str = get("quantity")
        .ok_or_else(|| BillingError::InvalidSample("missing column 'quantity' in CSV record".to_string()))?;
    let quantity: f64 = quantity_str
        .parse()
        .map_err(|e| BillingError::InvalidSample(format!("invalid quantity '{quantity_str}': {e}")))?;
    if quantity < 0.0 {
        return Err(BillingError::InvalidSample(format!(
            "quantity must be non-negative, got {quantity}"
        )));
    }

    Ok(ConsumptionSample {
        meter_id: get("meter_id").unwrap_or_default().to_string(),
        period_key: period_key.to_string(),
        quantity,
    })
}

pub fn read_samples<R: Read>(reader: R) -> Result<Vec<ConsumptionSample>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| BillingError::InvalidSample(format!("failed to read CSV headers: {e}")))?
        .clone();

    let mut samples = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| BillingError::InvalidSample(format!("failed to read CSV record: {e}")))?;
        samples.push(record_to_sample(&record, &headers)?);
    }
    Ok(samples)
}

pub fn read_samples_file(path: &Path) -> Result<Vec<ConsumptionSample>> {
    let file = std::fs::File::open(path)
        .map_err(|e| BillingError::InvalidSample(format!("failed to open CSV file: {e}")))?;
    read_samples(file)
}

/// Samples for the reconciler, optionally restricted to one meter.
pub fn to_raw_samples(samples: &[ConsumptionSample], meter_id: Option<&str>) -> Vec<RawSample> {
    samples
        .iter()
        .filter(|s| meter_id.map_or(true, |m| s.meter_id == m))
        .map(|s| RawSample::new(s.period_key.clone(), SampleValue::Number(s.quantity)))
        .collect()
}
