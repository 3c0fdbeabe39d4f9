use anyhow::Result;
use billing_service::{config::AppConfig, invoice::InvoiceGenerator, observability, store::PgBillingStore};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use time::OffsetDateTime;

/// Run the monthly invoice job once, for the cycle billed this month.
///
/// Consumers that already hold a bill for the cycle are skipped, so this is
/// safe to rerun after a partial failure.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgBillingStore::new(
        pool,
        Duration::from_secs(cfg.database.query_timeout_secs),
    ));

    let generator = InvoiceGenerator::new(store, cfg.tariff.engine());
    let summary = generator.run(OffsetDateTime::now_utc()).await?;

    tracing::info!(
        generated = summary.generated,
        skipped_existing = summary.skipped_existing,
        "manual invoice run complete"
    );

    Ok(())
}
