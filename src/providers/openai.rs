// src/providers/openai.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Embedding, SimilarityProvider};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};

/// OpenAI-compatible embeddings endpoint. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct Resp {
    data: Vec<Datum>,
}

#[derive(Deserialize)]
struct Datum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::new(api_key, &cfg.model, &cfg.endpoint, Duration::from_millis(cfg.timeout_ms))
    }

    pub fn new(api_key: String, model: &str, endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trend-slate/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Provider(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SimilarityProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>> {
        if self.api_key.is_empty() {
            return Err(Error::Config("OPENAI_API_KEY is not set".into()));
        }
        // Blank texts are never sent; their slots stay `None`.
        let sent: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.as_str()))
            .collect();
        let mut out = vec![None; texts.len()];
        if sent.is_empty() {
            return Ok(out);
        }

        let req = Req {
            model: &self.model,
            input: sent.iter().map(|(_, t)| *t).collect(),
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("embeddings request: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("embeddings status {status}")));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| Error::Provider(format!("embeddings body: {e}")))?;

        for d in body.data {
            if let Some((orig, _)) = sent.get(d.index) {
                if !d.embedding.is_empty() {
                    out[*orig] = Some(d.embedding);
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
