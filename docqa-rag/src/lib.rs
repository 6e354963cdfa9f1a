//! # docqa-rag
//!
//! Question answering over a single uploaded document.
//!
//! ## Overview
//!
//! A batch run indexes one document and answers a list of questions against it:
//!
//! 1. [`Segmenter`] extracts the document and yields [`ContentBlock`]s
//!    (prose, tables, figures) in document order.
//! 2. [`NodeBuilder`] chunks prose into [`Node`]s and summarizes tables and
//!    figures into [`Object`]s, with bounded parallelism.
//! 3. [`VectorIndex`] embeds everything into a run-scoped table.
//! 4. [`QueryEngine`] retrieves, reranks and synthesizes one answer per query,
//!    or exactly `"Data Not Available"` when the document can't ground one.
//! 5. [`DocQa`] drives the batch and optionally posts each answer to a
//!    [`Notifier`].
//!
//! ## Providers
//!
//! | Concern | Local | Remote (feature) |
//! |---------|-------|------------------|
//! | Extraction | [`PlainTextExtractor`] | `LlamaParseExtractor` (`llamaparse`) |
//! | Embedding / generation | none | `OpenAIEmbeddingProvider`, `OpenAIGenerator` (`openai`) |
//! | Vector store | [`InMemoryVectorStore`] | `QdrantVectorStore` (`qdrant`) |
//! | Reranking | [`TermOverlapReranker`], [`NoOpReranker`] | `CohereReranker` (`cohere`) |
//! | Notification | [`NoOpNotifier`] | `SlackNotifier` (`slack`) |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_rag::{DocQa, DocQaConfig, split_queries};
//!
//! let docqa = DocQa::from_config(&DocQaConfig::from_env()?)?;
//! let queries = split_queries("When was Company X founded?; What was its revenue?");
//! let report = docqa.run(Path::new("report.pdf"), &queries, false).await?;
//! for result in report.results {
//!     println!("{}: {}", result.query, result.answer);
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generator;
pub mod index;
pub mod inmemory;
pub mod nodes;
pub mod notify;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod segmenter;
pub mod vectorstore;

#[cfg(any(feature = "openai", feature = "cohere", feature = "llamaparse", feature = "slack"))]
mod http;

#[cfg(feature = "cohere")]
pub mod cohere;
#[cfg(feature = "llamaparse")]
pub mod llamaparse;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;
#[cfg(feature = "slack")]
pub mod slack;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{DocQaConfig, RagConfig, RagConfigBuilder, ServiceConfig};
pub use document::{
    BlockKind, BlockPosition, ContentBlock, Document, Node, Object, QueryResult, Retrievable,
    ScoredRetrievable, VectorRecord,
};
pub use embedding::EmbeddingProvider;
pub use engine::QueryEngine;
pub use error::{RagError, Result};
pub use generator::Generator;
pub use index::{IndexHandle, VectorIndex};
pub use inmemory::InMemoryVectorStore;
pub use nodes::{NodeBuilder, NodeSet, SkippedBlock};
pub use notify::{NoOpNotifier, Notifier, format_notification};
pub use pipeline::{
    BatchReport, DocQa, DocQaBuilder, NotificationFailure, QueryFailure, split_queries,
};
pub use prompt::NOT_AVAILABLE;
pub use reranker::{NoOpReranker, Reranker, TermOverlapReranker};
pub use segmenter::{ContentBlocks, DocumentExtractor, PlainTextExtractor, Segmenter};
pub use vectorstore::{DistanceMetric, Neighbor, TableSchema, VectorStore};

#[cfg(feature = "cohere")]
pub use cohere::CohereReranker;
#[cfg(feature = "llamaparse")]
pub use llamaparse::LlamaParseExtractor;
#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerator};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
#[cfg(feature = "slack")]
pub use slack::SlackNotifier;
