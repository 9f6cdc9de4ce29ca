use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time registration of engine metric descriptions.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed daily pipeline runs.");
        describe_counter!(
            "pipeline_stage_items_total",
            "Items emitted per pipeline stage."
        );
        describe_histogram!("pipeline_stage_ms", "Stage wall time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts of the last completed run.");
        describe_counter!(
            "validation_relaxations_total",
            "Batches re-validated with relaxed rules."
        );
        describe_counter!("dedup_clusters_total", "Clusters formed by deduplication.");
        describe_counter!(
            "provider_errors_total",
            "Similarity provider failures (after retries)."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
