//! One daily batch: ingest, run the pipeline, write snapshots to `data/metrics/`,
//! print the summary. `TREND_SLATE_RSS` may be a feed URL or a local XML file;
//! without it the run uses evergreen topics only.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_slate::config::EngineConfig;
use trend_slate::ingest::{self, providers::RssTrendSource, types::TrendSource};
use trend_slate::pipeline::Pipeline;
use trend_slate::providers::build_provider;
use trend_slate::snapshot::FileSnapshotSink;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trend_slate=info,warn"));
    let json = std::env::var("LOG_FORMAT").ok().as_deref() == Some("json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn sources_from_env() -> anyhow::Result<Vec<Box<dyn TrendSource>>> {
    let Ok(feed) = std::env::var("TREND_SLATE_RSS") else {
        return Ok(Vec::new());
    };
    let src = if feed.starts_with("http://") || feed.starts_with("https://") {
        RssTrendSource::from_url("rss", &feed)?
    } else {
        let xml = std::fs::read_to_string(&feed).with_context(|| format!("reading feed {feed}"))?;
        RssTrendSource::from_fixture_str("rss", &xml)
    };
    Ok(vec![Box::new(src)])
}

async fn run() -> anyhow::Result<()> {
    let cfg = EngineConfig::load_default()?;
    let provider = build_provider(&cfg.provider)?;
    let sources = sources_from_env()?;

    let now = Utc::now();
    let raw = ingest::collect(&sources, now).await;
    let pipeline = Pipeline::new(&cfg, provider, Arc::new(FileSnapshotSink::default()));
    let report = pipeline.run_daily_at(&raw, pipeline.daily_count(), now).await;

    println!("{}", serde_json::to_string_pretty(&report.summary())?);
    for item in report.plan.items() {
        tracing::info!(
            id = %item.scored.id(),
            lane = %item.narrative_lane,
            format = ?item.format,
            score = item.final_score(),
            "slate item"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "daily run failed");
        eprintln!("daily run failed: {e:#}");
        std::process::exit(1);
    }
}
