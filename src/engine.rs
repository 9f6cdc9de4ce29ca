//! Thread-safe config handle with opt-in polling hot reload.
//!
//! Enable reload with `TREND_SLATE_HOT_RELOAD=1`. Active only in dev
//! (debug build, or `SHUTTLE_ENV` in {local, development, dev}).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::Context;

use crate::config::EngineConfig;

pub const ENV_HOT_RELOAD: &str = "TREND_SLATE_HOT_RELOAD";

#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<RwLock<EngineConfig>>,
}

impl EngineHandle {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cfg)),
        }
    }

    /// Copy of the current config; callers build stage components from it.
    pub fn current(&self) -> EngineConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, cfg: EngineConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = cfg;
    }

    /// Parse and validate `path`, then swap. The old config stays on error.
    pub fn reload_from(&self, path: &Path) -> anyhow::Result<()> {
        let cfg = EngineConfig::load_from(path).context("hot reload")?;
        self.replace(cfg);
        tracing::info!(target: "pipeline", path = %path.display(), "engine config reloaded");
        Ok(())
    }
}

pub fn hot_reload_enabled() -> bool {
    let want = std::env::var(ENV_HOT_RELOAD).ok().as_deref() == Some("1");
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Poll `path` mtime every 2s and reload on change. No-op unless enabled.
pub fn start_hot_reload_thread(handle: EngineHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;
        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = last_mtime.is_some_and(|prev| mtime > prev);
                if changed {
                    if let Err(e) = handle.reload_from(&path) {
                        tracing::warn!(target: "pipeline", error = ?e, "config reload rejected");
                    }
                }
                last_mtime = Some(mtime);
            }
            thread::sleep(poll);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_reload_keeps_previous_config() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("engine.toml");
        let h = EngineHandle::new(EngineConfig::default());

        fs::write(&p, "[selection]\ndaily_count = 8").unwrap();
        h.reload_from(&p).unwrap();
        assert_eq!(h.current().selection.daily_count, 8);

        fs::write(&p, "[scoring.weights]\ncuriosity_gap = 0.9").unwrap();
        assert!(h.reload_from(&p).is_err());
        assert_eq!(h.current().selection.daily_count, 8);
    }

    #[serial_test::serial]
    #[test]
    fn hot_reload_is_opt_in() {
        std::env::remove_var(ENV_HOT_RELOAD);
        assert!(!hot_reload_enabled());
    }
}
