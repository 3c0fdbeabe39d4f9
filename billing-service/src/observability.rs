use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "billing_service=info";

/// `RUST_LOG` as given when it is set and parses, else `billing_service=info`.
fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global fmt subscriber.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(rust_log.as_deref()))
        .with_target(false)
        .init();
}
