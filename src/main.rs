//! Rescue Updates: binary entrypoint.
//! Boots the Axum HTTP server: config, source table, aggregator, routes.

use anyhow::Context;
use rescue_updates::{api, metrics::Metrics, AppConfig, AppState, Aggregator};
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with RESCUE_LOG_FORMAT=json.
/// A subscriber installed by the runtime takes precedence.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rescue_updates=info,warn"));

    let json = std::env::var("RESCUE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        info!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load_default().context("loading rescue config")?;
    let metrics = Metrics::init()?;
    let aggregator = Aggregator::from_config(&cfg).context("building source fetchers")?;

    info!(
        sources = ?aggregator.source_names(),
        result_cap = cfg.result_cap,
        fetch_timeout_secs = cfg.fetch_timeout_secs,
        "rescue-updates ready"
    );

    let state = AppState::new(aggregator);
    let router = api::with_static_files(api::router(state), &cfg.static_dir).merge(metrics.router());

    Ok(router.into())
}
