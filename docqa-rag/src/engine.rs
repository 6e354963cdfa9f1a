//! Answering one query against a built index.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::generator::Generator;
use crate::index::{IndexHandle, VectorIndex};
use crate::prompt::{self, NOT_AVAILABLE};
use crate::reranker::Reranker;

/// Retrieval, reranking and answer synthesis for a single query.
///
/// The engine holds no per-query state; one instance serves every query of a
/// batch.
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
    similarity_top_k: usize,
    rerank_top_n: usize,
    max_context_chars: usize,
}

impl QueryEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            index,
            reranker,
            generator,
            similarity_top_k: 15,
            rerank_top_n: 10,
            max_context_chars: 12_000,
        }
    }

    pub fn with_similarity_top_k(mut self, k: usize) -> Self {
        self.similarity_top_k = k;
        self
    }

    pub fn with_rerank_top_n(mut self, n: usize) -> Self {
        self.rerank_top_n = n;
        self
    }

    pub fn with_max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = chars;
        self
    }

    /// Answer `query` from the index under `handle`.
    ///
    /// Returns exactly [`NOT_AVAILABLE`] when nothing is retrieved or the model
    /// declines to answer from the context.
    pub async fn query(&self, handle: &IndexHandle, query: &str) -> Result<String> {
        let instrumented = prompt::instrument_query(query);

        let embedding = self.index.embed_query(&instrumented).await?;
        let candidates = self.index.search(handle, &embedding, self.similarity_top_k).await?;
        debug!(index = %handle, candidates = candidates.len(), "retrieved candidates");

        if candidates.is_empty() {
            info!(index = %handle, "no context retrieved");
            return Ok(NOT_AVAILABLE.to_string());
        }

        let ranked = self.reranker.rerank(&instrumented, candidates, self.rerank_top_n).await?;
        if ranked.is_empty() {
            return Ok(NOT_AVAILABLE.to_string());
        }

        let windows = prompt::pack_context(
            ranked.iter().map(|r| r.item.context_text()),
            self.max_context_chars,
        );
        debug!(
            index = %handle,
            context_items = ranked.len(),
            windows = windows.len(),
            generator = self.generator.name(),
            "synthesizing answer"
        );

        let mut windows = windows.into_iter();
        let Some(first) = windows.next() else {
            return Ok(NOT_AVAILABLE.to_string());
        };
        let mut answer = self.generator.complete(&first, &instrumented).await?;
        for window in windows {
            let refine = prompt::refine_query(&instrumented, &answer);
            answer = self.generator.complete(&window, &refine).await?;
        }

        Ok(prompt::normalize_answer(&answer))
    }
}
