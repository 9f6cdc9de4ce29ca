//! HTTP surface over the selection engine.
//!
//! Every request builds its stage components from the current engine config,
//! so a hot reload takes effect on the next call.

use std::sync::Arc;

use serde::Deserialize;
use shuttle_axum::axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::candidate::{Candidate, ScoreRecord, SelectionPlan, ValidationResult};
use crate::config::EngineConfig;
use crate::dedup::SemanticDeduplicator;
use crate::engine::EngineHandle;
use crate::pipeline::{DailyReport, Pipeline};
use crate::providers::DynProvider;
use crate::scoring::VpsScorer;
use crate::selector::NarrativeSelector;
use crate::snapshot::MemorySink;
use crate::validate::TrendValidator;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub provider: DynProvider,
}

impl AppState {
    pub fn new(engine: EngineHandle, provider: DynProvider) -> Self {
        Self { engine, provider }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/dedup", post(dedup))
        .route("/validate", post(validate))
        .route("/score", post(score))
        .route("/select", post(select))
        .route("/run", post(run))
        .route("/debug/config", get(debug_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct SelectReq {
    scored: Vec<ScoreRecord>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Deserialize)]
struct RunReq {
    candidates: Vec<Candidate>,
    #[serde(default)]
    count: Option<usize>,
}

async fn dedup(State(state): State<AppState>, Json(items): Json<Vec<Candidate>>) -> Json<Vec<Candidate>> {
    let cfg = state.engine.current();
    let d = SemanticDeduplicator::from_config(state.provider.clone(), &cfg.dedup);
    Json(d.deduplicate(&items).await)
}

async fn validate(
    State(state): State<AppState>,
    Json(items): Json<Vec<Candidate>>,
) -> Json<Vec<ValidationResult>> {
    let cfg = state.engine.current();
    Json(TrendValidator::from_config(&cfg.validation).validate_batch(&items))
}

async fn score(
    State(state): State<AppState>,
    Json(items): Json<Vec<ValidationResult>>,
) -> Json<Vec<ScoreRecord>> {
    let cfg = state.engine.current();
    Json(VpsScorer::from_config(&cfg).score_batch(&items))
}

async fn select(State(state): State<AppState>, Json(req): Json<SelectReq>) -> Json<SelectionPlan> {
    let cfg = state.engine.current();
    let selector = NarrativeSelector::from_config(&cfg);
    let count = req.count.unwrap_or_else(|| selector.daily_count());
    Json(selector.select_daily_content(&req.scored, count))
}

/// Full pipeline; snapshots stay in memory for the request.
async fn run(State(state): State<AppState>, Json(req): Json<RunReq>) -> Json<DailyReport> {
    let cfg = state.engine.current();
    let pipeline = Pipeline::new(&cfg, state.provider.clone(), Arc::new(MemorySink::new()));
    let count = req.count.unwrap_or_else(|| pipeline.daily_count());
    Json(pipeline.run_daily(&req.candidates, count).await)
}

async fn debug_config(State(state): State<AppState>) -> Json<EngineConfig> {
    Json(state.engine.current())
}
