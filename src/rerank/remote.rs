//! Cross-encoder reranker behind an HTTP `/rerank` endpoint.
//!
//! Speaks the request/response shape shared by text-embeddings-inference,
//! Jina and Cohere style rerank services:
//! `{model, query, documents}` in, `{results: [{index, relevance_score}]}` out.

use super::Reranker;
use crate::config::RerankSettings;
use crate::error::{PinpointError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// HTTP client for a remote cross-encoder.
pub struct RemoteReranker {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<String>,
}

impl RemoteReranker {
    /// Build a client for `settings.endpoint`. The key is read from `settings.api_key_env`.
    pub fn from_settings(settings: &RerankSettings, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(&settings.endpoint, &settings.model, api_key, timeout)
    }

    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| PinpointError::Config(format!("Invalid rerank endpoint {:?}: {}", endpoint, e)))?;
        let url = base
            .join("rerank")
            .map_err(|e| PinpointError::Config(format!("Invalid rerank endpoint {:?}: {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PinpointError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Reranker for RemoteReranker {
    #[instrument(skip(self, query, documents), fields(count = documents.len()))]
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.url.clone()).json(&RerankRequest {
            model: &self.model,
            query,
            documents,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PinpointError::Rerank(format!("{} returned {}: {}", self.url, status, body)));
        }

        let parsed: RerankResponse = response.json().await?;

        let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
        for result in parsed.results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                PinpointError::Rerank(format!("result index {} out of range", result.index))
            })?;
            *slot = Some(result.relevance_score);
        }

        debug!("Scored {} documents", documents.len());
        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| PinpointError::Rerank(format!("no score for document {}", i))))
            .collect()
    }

    fn name(&self) -> &str {
        "remote"
    }
}
