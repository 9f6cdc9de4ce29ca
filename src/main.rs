//! Trend Slate service: binary entrypoint.
//! Boots the Axum HTTP server over the selection engine, with `/metrics`.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_slate::config::{resolve_config_path, EngineConfig, DEFAULT_ENGINE_CONFIG_PATH};
use trend_slate::engine::{start_hot_reload_thread, EngineHandle};
use trend_slate::metrics::Metrics;
use trend_slate::providers::build_provider;
use trend_slate::{create_router, AppState};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - TREND_SLATE_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("TREND_SLATE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trend_slate=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = EngineConfig::load_default()?;
    let provider = build_provider(&cfg.provider).context("building similarity provider")?;
    let handle = EngineHandle::new(cfg);

    let path = resolve_config_path()?.unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH));
    start_hot_reload_thread(handle.clone(), path);

    let metrics = Metrics::init()?;
    let router = create_router(AppState::new(handle, provider)).merge(metrics.router());

    Ok(router.into())
}
