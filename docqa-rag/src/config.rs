//! Configuration for the document Q&A pipeline.
//!
//! [`RagConfig`] holds the retrieval parameters and is validated through
//! [`RagConfigBuilder`]. [`ServiceConfig`] holds credentials and model names
//! for the remote providers. Both are read once at startup (see
//! [`DocQaConfig::from_env`]) and passed explicitly into each component.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Guidance handed to the document extractor.
pub const DEFAULT_PARSING_INSTRUCTION: &str = "This document contains many tables and graphs. \
     Answer questions using the information in this article and be precise.";

/// Configuration parameters for segmentation, indexing and querying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum prose chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive prose chunks.
    pub chunk_overlap: usize,
    /// Number of nearest records retrieved per query.
    pub similarity_top_k: usize,
    /// Number of records kept after reranking.
    pub rerank_top_n: usize,
    /// Maximum number of concurrent summarization requests.
    pub num_workers: usize,
    /// Number of texts sent per embedding request while building the index.
    pub embed_batch_size: usize,
    /// Maximum characters of retrieved context per generation request.
    pub max_context_chars: usize,
    /// Natural-language guidance for document extraction.
    pub parsing_instruction: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2048,
            chunk_overlap: 200,
            similarity_top_k: 15,
            rerank_top_n: 10,
            num_workers: 8,
            embed_batch_size: 64,
            max_context_chars: 12_000,
            parsing_instruction: DEFAULT_PARSING_INSTRUCTION.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - any count is zero
    /// - `rerank_top_n > similarity_top_k`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        for (name, value) in [
            ("similarity_top_k", self.similarity_top_k),
            ("rerank_top_n", self.rerank_top_n),
            ("num_workers", self.num_workers),
            ("embed_batch_size", self.embed_batch_size),
            ("max_context_chars", self.max_context_chars),
        ] {
            if value == 0 {
                return Err(RagError::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.rerank_top_n > self.similarity_top_k {
            return Err(RagError::Config(format!(
                "rerank_top_n ({}) must not exceed similarity_top_k ({})",
                self.rerank_top_n, self.similarity_top_k
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum prose chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive prose chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of nearest records retrieved per query.
    pub fn similarity_top_k(mut self, k: usize) -> Self {
        self.config.similarity_top_k = k;
        self
    }

    /// Set the number of records kept after reranking.
    pub fn rerank_top_n(mut self, n: usize) -> Self {
        self.config.rerank_top_n = n;
        self
    }

    /// Set the summarization worker pool size.
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Set the embedding batch size used while building the index.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the context budget per generation request.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the extraction guidance.
    pub fn parsing_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.parsing_instruction = instruction.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] when [`RagConfig::validate`] rejects the
    /// parameters.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Credentials, model names and endpoints for the remote providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub openai_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub llama_cloud_api_key: Option<String>,
    pub slack_token: Option<String>,
    pub generation_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub rerank_model: String,
    pub slack_channel: String,
    pub slack_username: String,
    /// Qdrant endpoint; the in-memory store is used when unset.
    pub qdrant_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            cohere_api_key: None,
            llama_cloud_api_key: None,
            slack_token: None,
            generation_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            rerank_model: "rerank-english-v3.0".to_string(),
            slack_channel: "testing".to_string(),
            slack_username: "Zania Rag Bot".to_string(),
            qdrant_url: None,
            request_timeout_secs: 120,
        }
    }
}

impl ServiceConfig {
    /// Timeout applied to every remote request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Return the named credential or a [`RagError::Config`] naming the variable.
    pub fn require<'a>(value: &'a Option<String>, variable: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RagError::Config(format!("{variable} is not set")))
    }
}

/// Complete configuration for a [`DocQa`](crate::DocQa) instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocQaConfig {
    pub rag: RagConfig,
    pub services: ServiceConfig,
}

impl DocQaConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults. Numeric values that fail to parse are
    /// reported as [`RagError::Config`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut services = ServiceConfig {
            openai_api_key: lookup("OPENAI_API_KEY"),
            cohere_api_key: lookup("COHERE_API_KEY"),
            llama_cloud_api_key: lookup("LLAMA_CLOUD_API_KEY"),
            slack_token: lookup("SLACK_BOT_TOKEN"),
            qdrant_url: lookup("DOCQA_QDRANT_URL"),
            ..ServiceConfig::default()
        };
        if let Some(model) = lookup("DOCQA_GENERATION_MODEL") {
            services.generation_model = model;
        }
        if let Some(model) = lookup("DOCQA_EMBEDDING_MODEL") {
            services.embedding_model = model;
        }
        if let Some(model) = lookup("DOCQA_RERANK_MODEL") {
            services.rerank_model = model;
        }
        if let Some(channel) = lookup("DOCQA_SLACK_CHANNEL") {
            services.slack_channel = channel;
        }
        if let Some(username) = lookup("DOCQA_SLACK_USERNAME") {
            services.slack_username = username;
        }
        if let Some(dims) = lookup("DOCQA_EMBEDDING_DIMENSIONS") {
            services.embedding_dimensions = parse_number("DOCQA_EMBEDDING_DIMENSIONS", &dims)?;
        }
        if let Some(secs) = lookup("DOCQA_REQUEST_TIMEOUT_SECS") {
            services.request_timeout_secs = parse_number("DOCQA_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        Ok(Self { rag: RagConfig::default(), services })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| RagError::Config(format!("{key} must be a number, got '{raw}'")))
}
