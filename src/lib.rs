// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod candidate;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod providers;
pub mod resilience;
pub mod safety;
pub mod scoring;
pub mod selector;
pub mod snapshot;
pub mod text;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::candidate::{Candidate, Emotion, ScoreRecord, SelectionPlan, ValidationResult};
pub use crate::config::EngineConfig;
pub use crate::engine::EngineHandle;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{DailyReport, Pipeline};
