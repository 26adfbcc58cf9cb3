//! Reference network-backed adapters for `EmbeddingBackend` and
//! `MultiAgentAnalyser`'s underlying chat calls, following the same shape
//! as the teacher's `vault/llm.rs::OpenRouterClient`: a thin `reqwest`
//! wrapper, API key from the environment, a deadline passed explicitly by
//! the caller rather than hardcoded.
//!
//! `embed` is wrapped end to end by the Timeout/Cache composition (spec
//! §4.1): a facade timeout via [`LayeredTimeout`] around the data-source
//! timeout actually applied to the HTTP request, and the whole outcome
//! fronted by a [`CacheGuard`] keyed on model + text.

use crate::cacheguard::key::cache_key;
use crate::cacheguard::{CacheGuard, LayeredTimeout, SharedCacheGuard};
use crate::error::MemoryError;
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Facade timeout wrapping the data-source timeout below (spec §4.1:
/// "40-45s" outer budget).
const FACADE_TIMEOUT_S: u64 = 45;
/// Timeout applied directly to the outbound HTTP request.
const DATA_SOURCE_TIMEOUT_S: u64 = 30;

#[derive(Clone)]
pub struct OpenRouterEmbeddingBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    token_limit: usize,
    cache: SharedCacheGuard,
    cache_ttl: Duration,
}

impl OpenRouterEmbeddingBackend {
    pub fn from_env(
        http: reqwest::Client,
        model: &str,
        dimension: usize,
        token_limit: usize,
        cache_ttl_s: u64,
    ) -> Result<Self> {
        let api_key =
            std::env::var("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY missing")?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("OPENROUTER_API_KEY empty"));
        }
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            dimension,
            token_limit,
            cache: Arc::new(Mutex::new(CacheGuard::new(256))),
            cache_ttl: Duration::from_secs(cache_ttl_s),
        })
    }

    fn fetch_embedding(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let layered = LayeredTimeout::new(FACADE_TIMEOUT_S, DATA_SOURCE_TIMEOUT_S);
        let data_source_timeout = layered.data_source;
        let fut = async {
            let req = EmbeddingRequest {
                model: self.model.clone(),
                input: text.to_string(),
            };
            let resp = self
                .http
                .post("https://openrouter.ai/api/v1/embeddings")
                .timeout(data_source_timeout)
                .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.api_key))
                .json(&req)
                .send()
                .await
                .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(MemoryError::EmbeddingServiceUnavailable(format!(
                    "openrouter {}",
                    resp.status()
                )));
            }

            let parsed: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

            parsed
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or_else(|| MemoryError::EmbeddingServiceUnavailable("empty response".into()))
        };

        let run = layered.run(fut, || Err(MemoryError::EmbeddingServiceUnavailable("facade timeout exceeded".into())));

        match tokio::runtime::Handle::try_current() {
            Ok(h) => h.block_on(run),
            Err(_) => {
                let rt = tokio::runtime::Runtime::new()
                    .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;
                rt.block_on(run)
            }
        }
    }
}

impl super::EmbeddingBackend for OpenRouterEmbeddingBackend {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        if text.trim().is_empty() {
            return Err(MemoryError::EmbeddingInvalidInput("empty text".into()));
        }

        let key = cache_key("openrouter_embed", &(self.model.as_str(), text));
        let bytes = self
            .cache
            .lock()
            .cached(&key, self.cache_ttl, || {
                let embedding = self
                    .fetch_embedding(text)
                    .map_err(|e| anyhow!("{e}"))?;
                Ok(serde_json::to_vec(&embedding)?)
            })
            .map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| MemoryError::EmbeddingServiceUnavailable(e.to_string()))
    }

    fn token_limit(&self) -> usize {
        self.token_limit
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
