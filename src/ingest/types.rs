// src/ingest/types.rs
use crate::candidate::Candidate;
use crate::error::Result;

/// A feed of raw trending topics.
#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}
