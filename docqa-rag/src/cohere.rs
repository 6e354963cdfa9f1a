//! Cohere rerank provider.
//!
//! This module is only available when the `cohere` feature is enabled.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ServiceConfig;
use crate::document::ScoredRetrievable;
use crate::error::{RagError, Result};
use crate::http;
use crate::reranker::Reranker;

const COHERE_BASE_URL: &str = "https://api.cohere.com/v2";

const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";

/// A [`Reranker`] backed by the Cohere rerank API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::cohere::CohereReranker;
///
/// let reranker = CohereReranker::new("co-...")?;
/// let top = reranker.rerank("When was Company X founded?", candidates, 10).await?;
/// ```
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl CohereReranker {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("Cohere API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: COHERE_BASE_URL.into(),
            model: DEFAULT_RERANK_MODEL.into(),
        })
    }

    /// Create a reranker from the service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let api_key = ServiceConfig::require(&config.cohere_api_key, "COHERE_API_KEY")?;
        Ok(Self::new(api_key)?
            .with_model(&config.rerank_model)
            .with_client(http::client(config.request_timeout())?))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn error(message: impl Into<String>) -> RagError {
        RagError::RerankUnavailable { reranker: "Cohere".into(), message: message.into() }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
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

/// Map the service's ranked indices back onto the candidates.
///
/// Rejects out-of-range or repeated indices, and more results than requested.
fn apply_ranking(
    candidates: Vec<ScoredRetrievable>,
    results: Vec<RerankResult>,
    top_n: usize,
) -> Result<Vec<ScoredRetrievable>> {
    let expected = top_n.min(candidates.len());
    if results.len() != expected {
        return Err(CohereReranker::error(format!(
            "expected {expected} results, got {}",
            results.len()
        )));
    }

    let mut seen = HashSet::new();
    for result in &results {
        if result.index >= candidates.len() || !seen.insert(result.index) {
            return Err(CohereReranker::error(format!(
                "invalid result index {}",
                result.index
            )));
        }
    }

    let mut slots: Vec<Option<ScoredRetrievable>> = candidates.into_iter().map(Some).collect();
    let mut ranked: Vec<ScoredRetrievable> = results
        .into_iter()
        .filter_map(|result| {
            slots[result.index].take().map(|mut candidate| {
                candidate.score = result.relevance_score;
                candidate
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredRetrievable>,
        top_n: usize,
    ) -> Result<Vec<ScoredRetrievable>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        debug!(reranker = "Cohere", candidates = candidates.len(), top_n, "reranking");

        let request_body = RerankRequest {
            model: &self.model,
            query,
            documents: candidates.iter().map(|c| c.item.context_text()).collect(),
            top_n: top_n.min(candidates.len()),
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(reranker = "Cohere", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = http::failure(response).await;
            error!(reranker = "Cohere", %message, "rerank API error");
            return Err(Self::error(message));
        }

        let rerank: RerankResponse = response.json().await.map_err(|e| {
            error!(reranker = "Cohere", error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;

        apply_ranking(candidates, rerank.results, top_n)
    }
}
