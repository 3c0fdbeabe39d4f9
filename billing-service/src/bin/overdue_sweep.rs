use anyhow::Result;
use billing_service::{config::AppConfig, observability, store::PgBillingStore, sweep::OverdueSweep};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use time::OffsetDateTime;

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

    OverdueSweep::new(store).run(OffsetDateTime::now_utc()).await?;

    Ok(())
}
