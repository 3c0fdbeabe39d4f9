use anyhow::Result;
use billing_service::{
    alerts::AlertTracker,
    config::AppConfig,
    invoice::InvoiceGenerator,
    metrics_server,
    observability,
    store::PgBillingStore,
    sweep::OverdueSweep,
    Scheduler,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgBillingStore::new(
        pool,
        Duration::from_secs(cfg.database.query_timeout_secs),
    ));

    tracing::info!(policy = ?cfg.tariff.policy, categories = cfg.tariff.categories.len(), "tariffs loaded");

    let scheduler = Scheduler::new(
        InvoiceGenerator::new(store.clone(), cfg.tariff.engine()),
        OverdueSweep::new(store),
        cfg.schedule.clone(),
        AlertTracker::new(Duration::from_secs(cfg.alerts.cooldown_secs)),
    );

    tokio::select! {
        _ = scheduler.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutdown requested");
        }
    }

    Ok(())
}
