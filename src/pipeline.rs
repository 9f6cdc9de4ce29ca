//! Daily batch driver: dedup → validate → score → select → safety.
//!
//! Every component is built from one `EngineConfig` plus an injected provider
//! and snapshot sink. Each stage's output is written as a JSON snapshot;
//! snapshot failures are logged and never abort the run.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, SelectionPlan};
use crate::config::EngineConfig;
use crate::dedup::SemanticDeduplicator;
use crate::providers::DynProvider;
use crate::safety::{SafetyAction, SafetyChecker, SafetyVerdict};
use crate::scoring::VpsScorer;
use crate::selector::NarrativeSelector;
use crate::snapshot::SnapshotSink;
use crate::validate::TrendValidator;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageCounts {
    pub raw: usize,
    pub deduplicated: usize,
    pub validated: usize,
    pub passed: usize,
    /// Verdicts came from the relaxed rule set.
    pub relaxed: bool,
    pub scored: usize,
    pub selected: usize,
    pub suppressed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub status: String,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub counts: StageCounts,
    pub plan: SelectionPlan,
    pub safety: Vec<SafetyVerdict>,
}

pub struct Pipeline {
    dedup: SemanticDeduplicator,
    validator: TrendValidator,
    scorer: VpsScorer,
    selector: NarrativeSelector,
    safety: SafetyChecker,
    sink: Arc<dyn SnapshotSink>,
}

impl Pipeline {
    pub fn new(cfg: &EngineConfig, provider: DynProvider, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            dedup: SemanticDeduplicator::from_config(provider, &cfg.dedup),
            validator: TrendValidator::from_config(&cfg.validation),
            scorer: VpsScorer::from_config(cfg),
            selector: NarrativeSelector::from_config(cfg),
            safety: SafetyChecker::from_config(&cfg.safety),
            sink,
        }
    }

    pub fn daily_count(&self) -> usize {
        self.selector.daily_count()
    }

    pub async fn run_daily(&self, raw: &[Candidate], count: usize) -> DailyReport {
        self.run_daily_at(raw, count, Utc::now()).await
    }

    /// Same as [`run_daily`](Self::run_daily) with a fixed clock for timeliness.
    pub async fn run_daily_at(&self, raw: &[Candidate], count: usize, now: DateTime<Utc>) -> DailyReport {
        crate::metrics::ensure_described();
        let t0 = Instant::now();
        let mut counts = StageCounts {
            raw: raw.len(),
            ..Default::default()
        };
        tracing::info!(target: "pipeline", raw = raw.len(), count, "daily run started");

        let t = Instant::now();
        let unique = self.dedup.deduplicate(raw).await;
        counts.deduplicated = unique.len();
        stage_done("dedup", unique.len(), t);
        self.snapshot("trend_records", &unique).await;

        let t = Instant::now();
        let validated = self.validator.validate_batch(&unique);
        counts.validated = validated.len();
        counts.relaxed = validated.first().is_some_and(|v| v.relaxed);
        let passed: Vec<_> = validated.into_iter().filter(|v| v.passed).collect();
        counts.passed = passed.len();
        stage_done("validate", passed.len(), t);
        self.snapshot("validated_candidates", &passed).await;

        let t = Instant::now();
        let scored = self.scorer.score_batch_at(&passed, now);
        counts.scored = scored.len();
        stage_done("score", scored.len(), t);
        self.snapshot("scored_candidates", &scored).await;

        let t = Instant::now();
        let plan = self.selector.select_daily_content(&scored, count);
        counts.selected = plan.total_selected;
        stage_done("select", plan.total_selected, t);
        self.snapshot("selection_plan", &plan).await;

        let t = Instant::now();
        let safety = self.safety.check_plan(&plan);
        counts.suppressed = safety
            .iter()
            .filter(|v| v.action == SafetyAction::Suppress)
            .count();
        stage_done("safety", safety.len(), t);
        self.snapshot("safety_results", &safety).await;

        let report = DailyReport {
            status: "success".to_string(),
            started_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            elapsed_ms: t0.elapsed().as_millis() as u64,
            counts,
            plan,
            safety,
        };
        self.snapshot("daily_summary", &report.summary()).await;

        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "pipeline",
            elapsed_ms = report.elapsed_ms,
            selected = report.counts.selected,
            relaxed = report.counts.relaxed,
            "daily run complete"
        );
        report
    }

    async fn snapshot<T: Serialize>(&self, name: &str, value: &T) {
        let v = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "pipeline", snapshot = name, error = %e, "snapshot encode failed");
                return;
            }
        };
        if let Err(e) = self.sink.store(name, &v).await {
            tracing::warn!(target: "pipeline", snapshot = name, error = %e, "snapshot write failed");
        }
    }
}

fn stage_done(stage: &'static str, items: usize, started: Instant) {
    let ms = started.elapsed().as_secs_f64() * 1_000.0;
    counter!("pipeline_stage_items_total", "stage" => stage).increment(items as u64);
    histogram!("pipeline_stage_ms", "stage" => stage).record(ms);
    tracing::debug!(target: "pipeline", stage, items, ms, "stage done");
}

impl DailyReport {
    /// Compact summary without the full plan body.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "started_at": self.started_at,
            "elapsed_ms": self.elapsed_ms,
            "counts": self.counts,
            "lane_distribution": self.plan.lane_distribution,
            "selected_ids": self.plan.items().map(|i| i.scored.id().to_string()).collect::<Vec<_>>(),
        })
    }
}
