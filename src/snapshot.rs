// src/snapshot.rs
//! Per-stage JSON snapshots.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

pub const DEFAULT_SNAPSHOT_DIR: &str = "data/metrics";

#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Store one named snapshot, replacing any previous one with that name.
    async fn store(&self, name: &str, value: &serde_json::Value) -> Result<()>;
}

/// Writes `<dir>/<name>.json`, pretty-printed.
pub struct FileSnapshotSink {
    dir: PathBuf,
}

impl FileSnapshotSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileSnapshotSink {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_DIR)
    }
}

#[async_trait::async_trait]
impl SnapshotSink for FileSnapshotSink {
    async fn store(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(value)?;
        let path = self.dir.join(format!("{name}.json"));
        tokio::fs::write(&path, body).await?;
        tracing::debug!(target: "pipeline", path = %path.display(), "snapshot written");
        Ok(())
    }
}

/// Keeps snapshots in memory; for tests and the HTTP `/run` route.
#[derive(Default)]
pub struct MemorySink {
    pub items: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait::async_trait]
impl SnapshotSink for MemorySink {
    async fn store(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), value.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_sink_writes_named_json() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileSnapshotSink::new(tmp.path().join("metrics"));
        sink.store("daily_summary", &json!({"n": 1})).await.unwrap();
        let s = std::fs::read_to_string(tmp.path().join("metrics/daily_summary.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["n"], 1);
    }

    #[tokio::test]
    async fn memory_sink_keeps_latest() {
        let sink = MemorySink::new();
        sink.store("a", &json!(1)).await.unwrap();
        sink.store("a", &json!(2)).await.unwrap();
        assert_eq!(sink.get("a"), Some(json!(2)));
        assert_eq!(sink.names(), vec!["a".to_string(), "a".to_string()]);
    }
}
