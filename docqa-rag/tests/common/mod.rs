//! Deterministic providers for exercising the pipeline offline.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::prompt::{FIGURE_SUMMARY_QUERY, NOT_AVAILABLE, TABLE_SUMMARY_QUERY, user_query};
use docqa_rag::{
    DocQa, DocQaBuilder, EmbeddingProvider, Generator, InMemoryVectorStore, Neighbor, Notifier,
    PlainTextExtractor, RagConfig, RagError, Reranker, Result, ScoredRetrievable, TableSchema,
    TermOverlapReranker, VectorRecord, VectorStore,
};

pub const DIMENSIONS: usize = 64;

pub const COMPANY_REPORT: &str = "\
# Company X Annual Report

Company X was founded in 2010 by two engineers.

## Financials

| Year | Revenue |
|------|---------|
| 2022 | $3M |
| 2023 | $5M |
";

const STOP_WORDS: [&str; 12] =
    ["what", "was", "the", "when", "who", "how", "did", "does", "and", "for", "its", "which"];

pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '$')
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect()
}

fn fnv1a(term: &str) -> u64 {
    term.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

/// Bag-of-words embedding: every term adds 1.0 to its hash bucket.
pub struct HashingEmbedder;

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0; DIMENSIONS];
        for term in terms(text) {
            embedding[(fnv1a(&term) % DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Every embedding request fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding { provider: "failing".into(), message: "quota exceeded".into() })
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Delegates to an in-memory store but refuses every insert.
pub struct ReadOnlyStore {
    pub inner: Arc<InMemoryVectorStore>,
}

#[async_trait]
impl VectorStore for ReadOnlyStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.inner.drop_table(name).await
    }

    async fn create_table(&self, name: &str, schema: TableSchema) -> Result<()> {
        self.inner.create_table(name, schema).await
    }

    async fn insert(&self, table: &str, _records: &[VectorRecord]) -> Result<()> {
        Err(RagError::IndexBuild { index: table.to_string(), message: "table is read-only".into() })
    }

    async fn search(&self, table: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.inner.search(table, embedding, k).await
    }
}

/// Answers by quoting the context lines that mention the question's terms.
///
/// Declines with the sentinel unless every significant question term occurs
/// somewhere in the context. Summaries fail for blocks mentioning "broken".
pub struct KeywordGenerator;

fn significant_terms(question: &str) -> Vec<String> {
    terms(question)
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[async_trait]
impl Generator for KeywordGenerator {
    async fn complete(&self, context: &str, query: &str) -> Result<String> {
        if query == TABLE_SUMMARY_QUERY || query == FIGURE_SUMMARY_QUERY {
            if context.contains("broken") {
                return Err(RagError::Generation {
                    provider: "keyword".into(),
                    message: "cannot summarize".into(),
                });
            }
            return Ok(if query == TABLE_SUMMARY_QUERY {
                "Revenue by year".to_string()
            } else {
                "A chart".to_string()
            });
        }

        if let Some((_, rest)) = query.split_once("We have provided an existing answer: ") {
            return Ok(rest.lines().next().unwrap_or_default().to_string());
        }

        let wanted = significant_terms(user_query(query));
        let available: HashSet<String> = terms(context).into_iter().collect();
        if wanted.is_empty() || !wanted.iter().all(|t| available.contains(t)) {
            return Ok(NOT_AVAILABLE.to_string());
        }

        let lines: Vec<&str> = context
            .lines()
            .filter(|line| terms(line).iter().any(|t| wanted.contains(t)))
            .map(str::trim)
            .collect();
        Ok(lines.join(" "))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Fails for queries containing `poison`, otherwise reranks by term overlap.
pub struct SelectiveReranker {
    pub poison: &'static str,
}

#[async_trait]
impl Reranker for SelectiveReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredRetrievable>,
        top_n: usize,
    ) -> Result<Vec<ScoredRetrievable>> {
        if query.contains(self.poison) {
            return Err(RagError::RerankUnavailable {
                reranker: "selective".into(),
                message: "service unreachable".into(),
            });
        }
        TermOverlapReranker.rerank(query, candidates, top_n).await
    }
}

/// Records every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Rejects every message.
pub struct UnreachableNotifier;

#[async_trait]
impl Notifier for UnreachableNotifier {
    async fn notify(&self, _text: &str) -> Result<()> {
        Err(RagError::Notification {
            sink: "unreachable".into(),
            message: "connection refused".into(),
        })
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

/// A builder wired with the offline providers, missing only the vector store
/// and embedding provider.
pub fn offline_builder() -> DocQaBuilder {
    DocQa::builder()
        .config(RagConfig::default())
        .extractor(Arc::new(PlainTextExtractor))
        .generator(Arc::new(KeywordGenerator))
}

pub fn docqa(
    store: Arc<InMemoryVectorStore>,
    reranker: Arc<dyn Reranker>,
    notifier: Arc<dyn Notifier>,
) -> DocQa {
    offline_builder()
        .embedding_provider(Arc::new(HashingEmbedder))
        .vector_store(store)
        .reranker(reranker)
        .notifier(notifier)
        .build()
        .unwrap()
}

pub fn write_document(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

pub fn queries(list: &[&str]) -> Vec<String> {
    list.iter().map(|q| q.to_string()).collect()
}
