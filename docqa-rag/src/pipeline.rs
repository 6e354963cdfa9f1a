//! The batch driver.
//!
//! [`DocQa`] runs the whole workflow for one uploaded document: segment the
//! file, build nodes and objects, index them under a fresh run-scoped
//! [`IndexHandle`], then answer each query in order and optionally post every
//! answer to a [`Notifier`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{DocQa, RagConfig, InMemoryVectorStore, PlainTextExtractor};
//!
//! let docqa = DocQa::builder()
//!     .config(RagConfig::default())
//!     .extractor(Arc::new(PlainTextExtractor))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let report = docqa.run(Path::new("report.md"), &queries, false).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, error, info, info_span, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::{DocQaConfig, RagConfig, ServiceConfig};
use crate::document::QueryResult;
use crate::embedding::EmbeddingProvider;
use crate::engine::QueryEngine;
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::index::{IndexHandle, VectorIndex};
use crate::nodes::{NodeBuilder, NodeSet, SkippedBlock};
use crate::notify::{NoOpNotifier, Notifier, format_notification};
use crate::reranker::{NoOpReranker, Reranker};
use crate::segmenter::{DocumentExtractor, Segmenter};
use crate::vectorstore::VectorStore;

/// A query that failed after the index was built.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryFailure {
    /// Position of the query in the input list.
    pub index: usize,
    pub query: String,
    /// The failed phase, as reported by [`RagError::phase`].
    pub phase: String,
    pub error: String,
}

/// An answer that could not be delivered to the notifier.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationFailure {
    pub index: usize,
    pub query: String,
    pub error: String,
}

/// The outcome of [`DocQa::run`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Name of the run-scoped index. It is discarded before the report is returned.
    pub index: String,
    /// Answers of the successful queries, in input order.
    pub results: Vec<QueryResult>,
    pub failures: Vec<QueryFailure>,
    pub notification_failures: Vec<NotificationFailure>,
    /// Tables and figures left out of the index because their summary failed.
    pub skipped_blocks: Vec<SkippedBlock>,
}

/// Split a `;`-separated list of queries, trimming and dropping empty entries.
pub fn split_queries(raw: &str) -> Vec<String> {
    raw.split(';').map(str::trim).filter(|q| !q.is_empty()).map(str::to_string).collect()
}

/// Answers batches of questions against a single document.
///
/// Construct one via [`DocQa::builder()`] or [`DocQa::from_config`].
pub struct DocQa {
    config: RagConfig,
    segmenter: Segmenter,
    node_builder: NodeBuilder,
    index: Arc<VectorIndex>,
    engine: QueryEngine,
    notifier: Arc<dyn Notifier>,
}

impl DocQa {
    pub fn builder() -> DocQaBuilder {
        DocQaBuilder::default()
    }

    /// Wire the providers selected by `config`.
    ///
    /// A remote provider is used when its feature is compiled in and its
    /// credential (or URL) is set. Otherwise the local implementation is used:
    /// [`PlainTextExtractor`](crate::PlainTextExtractor),
    /// [`InMemoryVectorStore`](crate::InMemoryVectorStore),
    /// [`TermOverlapReranker`](crate::TermOverlapReranker) and
    /// [`NoOpNotifier`]. Embedding and generation have no local fallback and
    /// require the `openai` feature.
    pub fn from_config(config: &DocQaConfig) -> Result<Self> {
        let services = &config.services;
        let (embedding_provider, generator) = remote_models(services)?;

        #[cfg(feature = "llamaparse")]
        let extractor: Arc<dyn DocumentExtractor> = if services.llama_cloud_api_key.is_some() {
            Arc::new(crate::llamaparse::LlamaParseExtractor::from_config(services)?)
        } else {
            Arc::new(crate::segmenter::PlainTextExtractor)
        };
        #[cfg(not(feature = "llamaparse"))]
        let extractor: Arc<dyn DocumentExtractor> = Arc::new(crate::segmenter::PlainTextExtractor);

        #[cfg(feature = "qdrant")]
        let vector_store: Arc<dyn VectorStore> = match &services.qdrant_url {
            Some(url) => Arc::new(crate::qdrant::QdrantVectorStore::new(url)?),
            None => Arc::new(crate::inmemory::InMemoryVectorStore::new()),
        };
        #[cfg(not(feature = "qdrant"))]
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(crate::inmemory::InMemoryVectorStore::new());

        #[cfg(feature = "cohere")]
        let reranker: Arc<dyn Reranker> = if services.cohere_api_key.is_some() {
            Arc::new(crate::cohere::CohereReranker::from_config(services)?)
        } else {
            Arc::new(crate::reranker::TermOverlapReranker)
        };
        #[cfg(not(feature = "cohere"))]
        let reranker: Arc<dyn Reranker> = Arc::new(crate::reranker::TermOverlapReranker);

        #[cfg(feature = "slack")]
        let notifier: Arc<dyn Notifier> = if services.slack_token.is_some() {
            Arc::new(crate::slack::SlackNotifier::from_config(services)?)
        } else {
            Arc::new(NoOpNotifier)
        };
        #[cfg(not(feature = "slack"))]
        let notifier: Arc<dyn Notifier> = Arc::new(NoOpNotifier);

        DocQa::builder()
            .config(config.rag.clone())
            .extractor(extractor)
            .embedding_provider(embedding_provider)
            .vector_store(vector_store)
            .generator(generator)
            .reranker(reranker)
            .notifier(notifier)
            .build()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Index the document at `path` and answer `queries` in order.
    ///
    /// Build-phase errors (segmentation, indexing, embedding while building)
    /// abort the batch. A query that fails afterwards is recorded in
    /// [`BatchReport::failures`] and the remaining queries still run. With
    /// `notify`, each answer is posted after its query; delivery failures are
    /// collected in [`BatchReport::notification_failures`] and never affect
    /// the results.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for an empty query list, or the first
    /// build-phase error.
    pub async fn run(&self, path: &Path, queries: &[String], notify: bool) -> Result<BatchReport> {
        if queries.is_empty() {
            return Err(RagError::Config("at least one query is required".to_string()));
        }

        let handle = IndexHandle::scoped("docqa");
        info!(index = %handle, path = %path.display(), queries = queries.len(), "starting batch");

        let blocks = self.segmenter.segment(path).await?;
        let nodes = self.node_builder.build(blocks).await;
        self.index.reset(&handle).await?;

        let report = self.index_and_answer(&handle, nodes, queries, notify).await;

        if let Err(e) = self.index.discard(&handle).await {
            warn!(index = %handle, error = %e, "failed to discard index");
        }
        report
    }

    async fn index_and_answer(
        &self,
        handle: &IndexHandle,
        nodes: NodeSet,
        queries: &[String],
        notify: bool,
    ) -> Result<BatchReport> {
        let skipped_blocks = nodes.skipped.clone();
        self.index.build(handle, &nodes.into_retrievables()).await?;

        let mut report = BatchReport {
            index: handle.name().to_string(),
            results: Vec::with_capacity(queries.len()),
            failures: Vec::new(),
            notification_failures: Vec::new(),
            skipped_blocks,
        };

        for (i, query) in queries.iter().enumerate() {
            let span = info_span!("query", index = i);
            let outcome =
                self.answer(handle, i, query, notify, &mut report).instrument(span).await;
            if let Err(e) = outcome {
                error!(query_index = i, phase = e.phase(), error = %e, "query failed");
                report.failures.push(QueryFailure {
                    index: i,
                    query: query.clone(),
                    phase: e.phase().to_string(),
                    error: e.to_string(),
                });
            }
        }

        info!(
            index = %handle,
            answered = report.results.len(),
            failed = report.failures.len(),
            "finished batch"
        );
        Ok(report)
    }

    async fn answer(
        &self,
        handle: &IndexHandle,
        i: usize,
        query: &str,
        notify: bool,
        report: &mut BatchReport,
    ) -> Result<()> {
        let answer = self.engine.query(handle, query).await?;
        info!(query_index = i, answer_len = answer.len(), "answered query");

        if notify {
            let message = format_notification(query, &answer);
            if let Err(e) = self.notifier.notify(&message).await {
                warn!(
                    query_index = i,
                    sink = self.notifier.name(),
                    error = %e,
                    "notification failed"
                );
                report.notification_failures.push(NotificationFailure {
                    index: i,
                    query: query.to_string(),
                    error: e.to_string(),
                });
            }
        }

        report.results.push(QueryResult { query: query.to_string(), answer });
        Ok(())
    }
}

#[cfg(feature = "openai")]
fn remote_models(
    services: &ServiceConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn Generator>)> {
    Ok((
        Arc::new(crate::openai::OpenAIEmbeddingProvider::from_config(services)?),
        Arc::new(crate::openai::OpenAIGenerator::from_config(services)?),
    ))
}

#[cfg(not(feature = "openai"))]
fn remote_models(
    _services: &ServiceConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn Generator>)> {
    Err(RagError::Config(
        "no embedding or generation provider available: enable the `openai` feature".to_string(),
    ))
}

/// Builder for constructing a [`DocQa`].
///
/// `config`, `extractor`, `embedding_provider`, `vector_store` and `generator`
/// are required. The chunker defaults to a [`RecursiveChunker`] sized from
/// the config, the reranker to [`NoOpReranker`] and the notifier to
/// [`NoOpNotifier`].
#[derive(Default)]
pub struct DocQaBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn DocumentExtractor>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn Generator>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl DocQaBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the generator used for summaries and answers.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the [`DocQa`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing or the
    /// config fails [`RagConfig::validate`].
    pub fn build(self) -> Result<DocQa> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let extractor =
            self.extractor.ok_or_else(|| RagError::Config("extractor is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;

        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let reranker = self.reranker.unwrap_or_else(|| Arc::new(NoOpReranker));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoOpNotifier));

        let index =
            Arc::new(VectorIndex::new(vector_store, embedding_provider, config.embed_batch_size));
        let engine = QueryEngine::new(index.clone(), reranker, generator.clone())
            .with_similarity_top_k(config.similarity_top_k)
            .with_rerank_top_n(config.rerank_top_n)
            .with_max_context_chars(config.max_context_chars);

        Ok(DocQa {
            segmenter: Segmenter::new(extractor, config.parsing_instruction.clone()),
            node_builder: NodeBuilder::new(chunker, generator, config.num_workers),
            index,
            engine,
            notifier,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_split_on_semicolons() {
        assert_eq!(
            split_queries(" When was Company X founded? ;What was its revenue?; ;"),
            vec!["When was Company X founded?", "What was its revenue?"]
        );
        assert!(split_queries(" ; ").is_empty());
    }

    #[test]
    fn builder_reports_missing_components() {
        let err = DocQa::builder().config(RagConfig::default()).build().err().unwrap();
        assert!(matches!(err, RagError::Config(ref m) if m.contains("extractor")));
    }

    #[cfg(not(feature = "openai"))]
    #[test]
    fn from_config_needs_a_generation_provider() {
        let err = DocQa::from_config(&DocQaConfig::default()).err().unwrap();
        assert_eq!(err.phase(), "configuration");
    }
}
