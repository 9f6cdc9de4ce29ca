//! Error taxonomy for the engine.
//!
//! Library code returns [`Result`]; binaries and loaders wrap it in `anyhow`.
//! Per-item faults inside a batch are logged and skipped, never surfaced to the
//! batch caller (see [`isolate`]).

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

/// Engine result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Ingestion or trend-source failure.
    #[error("sense layer error: {0}")]
    SenseLayer(String),

    /// A candidate could not be validated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A candidate produced an unusable score.
    #[error("scoring error: {0}")]
    Scoring(String),

    /// Reserved; the selector has no failing path today.
    #[error("selection error: {0}")]
    Selection(String),

    /// Embedding / similarity provider failure (timeout, HTTP, rate limit).
    #[error("provider error: {0}")]
    Provider(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Short machine-friendly kind, used as a metrics/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SenseLayer(_) => "sense_layer",
            Error::Validation(_) => "validation",
            Error::Scoring(_) => "scoring",
            Error::Selection(_) => "selection",
            Error::Provider(_) => "provider",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Toml(_) => "toml",
        }
    }
}

/// Run one per-item computation so that neither an `Err` nor a panic escapes
/// into the surrounding batch. Failures are logged under `stage` and yield `None`.
pub(crate) fn isolate<T, F>(stage: &'static str, item_id: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) => {
            tracing::warn!(target: "pipeline", stage, id = item_id, kind = e.kind(), error = %e, "item skipped");
            None
        }
        Err(_) => {
            tracing::error!(target: "pipeline", stage, id = item_id, "item panicked; skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolate_swallows_errors_and_panics() {
        assert_eq!(isolate("t", "a", || Ok(3)), Some(3));
        assert_eq!(
            isolate::<i32, _>("t", "b", || Err(Error::Scoring("nan".into()))),
            None
        );
        assert_eq!(isolate::<i32, _>("t", "c", || panic!("boom")), None);
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(Error::Selection("x".into()).kind(), "selection");
        assert_eq!(Error::Config("x".into()).kind(), "config");
    }
}
