//! Similarity providers: turn candidate texts into embeddings.
//!
//! `embed_batch` may return `None` for individual items (empty text, model
//! refused); an `Err` means the whole batch failed and callers degrade.

use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::Result;

pub mod cached;
pub mod lexical;
pub mod openai;

pub use cached::CachedEmbedder;
pub use lexical::LexicalEmbedder;
pub use openai::OpenAiEmbedder;

pub type Embedding = Vec<f32>;

#[async_trait::async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// One slot per input text, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>>;

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn SimilarityProvider>;

/// Raw cosine in [-1, 1]. Mismatched lengths or zero vectors give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

/// Build the configured provider. Remote providers come wrapped in cache,
/// rate limiter and retry policy.
pub fn build_provider(cfg: &ProviderConfig) -> Result<DynProvider> {
    match cfg.kind {
        ProviderKind::Lexical => Ok(Arc::new(LexicalEmbedder::new(cfg.dimensions))),
        ProviderKind::Openai => {
            let remote = OpenAiEmbedder::from_config(cfg)?;
            Ok(Arc::new(CachedEmbedder::from_config(remote, cfg)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_edges() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn default_kind_is_lexical() {
        let p = build_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(p.name(), "lexical");
    }
}
