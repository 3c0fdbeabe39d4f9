use anyhow::{bail, Result};
use billing_service::{
    observability,
    samples_csv,
    series::{reconcile, Granularity, OutputFormat},
};
use std::{env, path::Path};
use time::OffsetDateTime;

/// Print the dense chart series for a CSV of consumption samples.
///
/// Usage:
///   reconcile_csv <csv_path> [day|month] [canonical|display] [meter_id]
fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: reconcile_csv <csv_path> [day|month] [canonical|display] [meter_id]");
    }

    let granularity = match args.get(2).map(String::as_str) {
        None | Some("day") => Granularity::Day,
        Some("month") => Granularity::Month,
        Some(other) => bail!("unknown granularity '{other}'"),
    };
    let format = match args.get(3).map(String::as_str) {
        None | Some("canonical") => OutputFormat::Canonical,
        Some("display") => OutputFormat::Display,
        Some(other) => bail!("unknown output format '{other}'"),
    };
    let meter_id = args.get(4).map(String::as_str);

    let samples = samples_csv::read_samples_file(Path::new(&args[1]))?;
    let raw = samples_csv::to_raw_samples(&samples, meter_id);
    tracing::info!(samples = raw.len(), ?granularity, "reconciling CSV samples");

    let series = reconcile(&raw, granularity, format, OffsetDateTime::now_utc().date())?;
    println!("{}", serde_json::to_string_pretty(&series.to_chart())?);

    Ok(())
}
