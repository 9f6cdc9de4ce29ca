// src/providers/lexical.rs
use super::{Embedding, SimilarityProvider};
use crate::error::Result;

/// Deterministic, offline embeddings: feature-hashed bag of words plus
/// adjacent-word bigrams, L2-normalized.
#[derive(Debug, Clone)]
pub struct LexicalEmbedder {
    dims: usize,
}

impl LexicalEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(16) }
    }

    pub fn embed(&self, text: &str) -> Option<Embedding> {
        let toks: Vec<String> = crate::text::words(text).collect();
        if toks.is_empty() {
            return None;
        }
        let mut v = vec![0.0f32; self.dims];
        for t in &toks {
            v[bucket(t.as_bytes(), self.dims)] += 1.0;
        }
        for pair in toks.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            v[bucket(joined.as_bytes(), self.dims)] += 0.5;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Some(v)
    }
}

impl Default for LexicalEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

// FNV-1a: stable across runs and platforms.
fn bucket(bytes: &[u8], dims: usize) -> usize {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (h % dims as u64) as usize
}

#[async_trait::async_trait]
impl SimilarityProvider for LexicalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}
