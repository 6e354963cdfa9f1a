//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering questions against a document.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be read or is not supported.
    #[error("Document parse error ({path}): {message}")]
    DocumentParse {
        /// Path of the document that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding had the wrong dimension or the index schema is malformed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The vector store failed during reset, create, insert or search.
    #[error("Index error ({index}): {message}")]
    IndexBuild {
        /// The index (table) name involved.
        index: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The relevance reranking service could not be used.
    #[error("Reranker unavailable ({reranker}): {message}")]
    RerankUnavailable {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation service failed while summarizing or answering.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A notification could not be delivered.
    #[error("Notification error ({sink}): {message}")]
    Notification {
        /// The notification sink that produced the error.
        sink: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// The pipeline phase this error belongs to, for caller-facing reports.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::DocumentParse { .. } => "segmentation",
            Self::Schema(_) | Self::IndexBuild { .. } => "indexing",
            Self::Embedding { .. } => "embedding",
            Self::RerankUnavailable { .. } => "reranking",
            Self::Generation { .. } => "generation",
            Self::Notification { .. } => "notification",
            Self::Config(_) => "configuration",
        }
    }

    pub(crate) fn index(index: &str, message: impl Into<String>) -> Self {
        Self::IndexBuild { index: index.to_string(), message: message.into() }
    }
}

/// A convenience result type for docqa operations.
pub type Result<T> = std::result::Result<T, RagError>;
