//! Embedding provider client
//!
//! The embedding model runs out of process behind a text-embeddings-inference
//! style HTTP server; this client sends text to `/embed` and gets back one
//! unit-normed 384-dimensional vector per input. Length gating (events < 20
//! chars, users < 10 chars) is the caller's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::CityPulseError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::Result;

/// Dimensionality of the deployed sentence-embedding model
pub const EMBEDDING_DIM: usize = 384;

/// Text-to-vector provider
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimension, fixed per deployment.
    fn dimension(&self) -> usize;

    /// Map text to one embedding vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a str,
    normalize: bool,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct EmbedResponse(Vec<Vec<f32>>);

/// HTTP-backed [`Embedder`]
pub struct HttpEmbedder {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CityPulseError::Embedding(format!("http client build failed: {}", e)))?;

        info!(url = %config.api_url, dimension = EMBEDDING_DIM, "Embedding provider configured");
        Ok(Self {
            http,
            endpoint: format!("{}/embed", config.api_url.trim_end_matches('/')),
            retry: RetryPolicy::default(),
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&EmbedRequest {
                inputs: text,
                normalize: true,
            })
            .send()
            .await
            .map_err(|e| CityPulseError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CityPulseError::Embedding(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let EmbedResponse(mut rows) = response
            .json()
            .await
            .map_err(|e| CityPulseError::Embedding(format!("malformed response: {}", e)))?;

        let vector = rows
            .pop()
            .ok_or_else(|| CityPulseError::Embedding("empty response".to_string()))?;

        if vector.len() != EMBEDDING_DIM {
            return Err(CityPulseError::Embedding(format!(
                "expected {} dimensions, got {}",
                EMBEDDING_DIM,
                vector.len()
            )));
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_with_backoff(&self.retry, "embed", || self.embed_once(text)).await
    }
}
