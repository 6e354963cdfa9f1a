//! Reranker trait for re-scoring retrieved candidates.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::ScoredRetrievable;
use crate::error::Result;
use crate::prompt;

/// A reranker that re-scores and reorders search candidates.
///
/// Implementations return exactly `min(top_n, candidates.len())` items, each
/// taken from `candidates` without duplication, ordered by descending
/// relevance score.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredRetrievable>,
        top_n: usize,
    ) -> Result<Vec<ScoredRetrievable>>;
}

/// A no-op reranker that keeps vector-search order and truncates to `top_n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredRetrievable>,
        top_n: usize,
    ) -> Result<Vec<ScoredRetrievable>> {
        candidates.truncate(top_n);
        Ok(candidates)
    }
}

/// A local lexical reranker.
///
/// Scores each candidate by the fraction of distinct query terms (longer than
/// two characters) that appear in its context text. The grounding instruction
/// is not part of the query terms. Ties keep vector order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '$')
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredRetrievable>,
        top_n: usize,
    ) -> Result<Vec<ScoredRetrievable>> {
        let query_terms = terms(prompt::user_query(query));
        let mut rescored: Vec<ScoredRetrievable> = candidates
            .into_iter()
            .map(|mut candidate| {
                let text_terms = terms(candidate.item.context_text());
                let hits = query_terms.iter().filter(|t| text_terms.contains(*t)).count();
                candidate.score = if query_terms.is_empty() {
                    0.0
                } else {
                    hits as f32 / query_terms.len() as f32
                };
                candidate
            })
            .collect();

        rescored.sort_by(|a, b| b.score.total_cmp(&a.score));
        rescored.truncate(top_n);
        Ok(rescored)
    }
}
