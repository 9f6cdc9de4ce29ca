// src/providers/cached.rs
use std::time::Duration;

use metrics::counter;
use sha2::{Digest, Sha256};

use super::{Embedding, SimilarityProvider};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::resilience::{is_transient, RateLimit, RetryPolicy, TtlCache};

/// Wraps any provider with a TTL cache, a rate limiter and a retry policy.
/// Only cache misses reach the inner provider, as one batch call.
pub struct CachedEmbedder<P: SimilarityProvider> {
    inner: P,
    cache: TtlCache<String, Embedding>,
    limiter: RateLimit,
    retry: RetryPolicy,
    max_wait: Duration,
}

impl<P: SimilarityProvider> CachedEmbedder<P> {
    pub fn new(inner: P, ttl: Duration, limiter: RateLimit, retry: RetryPolicy) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
            limiter,
            retry,
            max_wait: Duration::from_secs(5),
        }
    }

    pub fn from_config(inner: P, cfg: &ProviderConfig) -> Self {
        Self::new(
            inner,
            Duration::from_secs(cfg.cache_ttl_secs),
            RateLimit::from_limits(cfg.rate_limit_per_sec, cfg.rate_limit_capacity),
            cfg.retry.into(),
        )
    }

    pub fn with_max_wait(mut self, d: Duration) -> Self {
        self.max_wait = d;
        self
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[async_trait::async_trait]
impl<P: SimilarityProvider> SimilarityProvider for CachedEmbedder<P> {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>> {
        let mut out: Vec<Option<Embedding>> = vec![None; texts.len()];
        let mut missing_idx = Vec::new();
        let mut missing = Vec::new();
        for (i, t) in texts.iter().enumerate() {
            match self.cache.get(&Self::key(t)) {
                Some(e) => out[i] = Some(e),
                None => {
                    missing_idx.push(i);
                    missing.push(t.clone());
                }
            }
        }
        tracing::debug!(
            target: "providers",
            provider = self.inner.name(),
            hits = texts.len() - missing.len(),
            misses = missing.len(),
            "embedding cache"
        );
        if missing.is_empty() {
            return Ok(out);
        }

        if !self.limiter.acquire(self.max_wait).await {
            counter!("provider_errors_total", "reason" => "rate_limited").increment(1);
            return Err(Error::Provider("rate limit exhausted".into()));
        }

        let fetched = self
            .retry
            .run("embed_batch", || self.inner.embed_batch(&missing), is_transient)
            .await
            .map_err(|e| {
                counter!("provider_errors_total", "reason" => e.kind()).increment(1);
                e
            })?;
        if fetched.len() != missing.len() {
            counter!("provider_errors_total", "reason" => "shape").increment(1);
            return Err(Error::Provider(format!(
                "provider returned {} embeddings for {} texts",
                fetched.len(),
                missing.len()
            )));
        }

        for ((i, text), emb) in missing_idx.into_iter().zip(&missing).zip(fetched) {
            if let Some(e) = emb {
                self.cache.insert(Self::key(text), e.clone());
                out[i] = Some(e);
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LexicalEmbedder;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait::async_trait]
    impl SimilarityProvider for Counting {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(Error::Provider("transient".into()));
            }
            LexicalEmbedder::default().embed_batch(texts).await
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            exponential: false,
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let p = CachedEmbedder::new(
            Counting { calls: AtomicU32::new(0), fail_first: 0 },
            Duration::from_secs(60),
            RateLimit::from_limits(1, 10),
            quick_retry(),
        );
        let texts = vec!["fed holds rates".to_string(), "bitcoin rallies".to_string()];
        let a = p.embed_batch(&texts).await.unwrap();
        let b = p.embed_batch(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(p.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.cached_len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let p = CachedEmbedder::new(
            Counting { calls: AtomicU32::new(0), fail_first: 2 },
            Duration::from_secs(60),
            RateLimit::from_limits(1, 10),
            quick_retry(),
        );
        let out = p.embed_batch(&["x y".to_string()]).await.unwrap();
        assert!(out[0].is_some());
        assert_eq!(p.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_fails_the_batch() {
        let p = CachedEmbedder::new(
            Counting { calls: AtomicU32::new(0), fail_first: 0 },
            Duration::from_secs(60),
            RateLimit::from_limits(1, 1),
            quick_retry(),
        )
        .with_max_wait(Duration::from_millis(5));
        p.embed_batch(&["a".to_string()]).await.unwrap();
        let err = p.embed_batch(&["b".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), "provider");
    }
}
