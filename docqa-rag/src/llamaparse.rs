//! LlamaParse cloud document extraction.
//!
//! This module is only available when the `llamaparse` feature is enabled.
//! A document is uploaded as a parsing job, the job is polled until it
//! finishes, and the markdown result is downloaded.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::ServiceConfig;
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::http;
use crate::segmenter::DocumentExtractor;

const LLAMA_CLOUD_BASE_URL: &str = "https://api.cloud.llamaindex.ai/api/parsing";

/// A [`DocumentExtractor`] backed by the LlamaParse API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::llamaparse::LlamaParseExtractor;
///
/// let extractor = LlamaParseExtractor::new("llx-...")?;
/// let document = extractor.extract(Path::new("report.pdf"), "Be precise.").await?;
/// ```
pub struct LlamaParseExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_polls: usize,
}

impl LlamaParseExtractor {
    /// Create an extractor that polls every 2 seconds, up to 300 times.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("LlamaCloud API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: LLAMA_CLOUD_BASE_URL.into(),
            poll_interval: Duration::from_secs(2),
            max_polls: 300,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let api_key = ServiceConfig::require(&config.llama_cloud_api_key, "LLAMA_CLOUD_API_KEY")?;
        Ok(Self::new(api_key)?.with_client(http::client(config.request_timeout())?))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = max_polls.max(1);
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

    async fn upload(&self, path: &Path, guidance: &str) -> std::result::Result<String, String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| format!("failed to read file: {e}"))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("result_type", "markdown")
            .text("parsing_instruction", guidance.to_string());

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("upload failed: {e}"))?;
        if !response.status().is_success() {
            return Err(http::failure(response).await);
        }

        let job: JobResponse =
            response.json().await.map_err(|e| format!("failed to parse upload response: {e}"))?;
        Ok(job.id)
    }

    async fn wait_for(&self, job_id: &str) -> std::result::Result<(), String> {
        for poll in 1..=self.max_polls {
            let response = self
                .client
                .get(format!("{}/job/{job_id}", self.base_url))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| format!("status request failed: {e}"))?;
            if !response.status().is_success() {
                return Err(http::failure(response).await);
            }

            let job: JobResponse =
                response.json().await.map_err(|e| format!("failed to parse job status: {e}"))?;
            match JobStatus::parse(&job.status) {
                JobStatus::Success => return Ok(()),
                JobStatus::Failed => return Err(format!("parsing job ended with {}", job.status)),
                JobStatus::Pending => {
                    debug!(job = job_id, poll, status = %job.status, "parsing job pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        Err(format!("parsing job did not finish after {} polls", self.max_polls))
    }

    async fn fetch_markdown(&self, job_id: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(format!("{}/job/{job_id}/result/markdown", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| format!("result request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(http::failure(response).await);
        }
        let result: MarkdownResult =
            response.json().await.map_err(|e| format!("failed to parse result: {e}"))?;
        Ok(result.markdown)
    }
}

#[derive(Deserialize)]
struct JobResponse {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct MarkdownResult {
    markdown: String,
}

#[derive(Debug, PartialEq, Eq)]
enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    fn parse(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "SUCCESS" => Self::Success,
            "ERROR" | "CANCELED" | "CANCELLED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[async_trait]
impl DocumentExtractor for LlamaParseExtractor {
    async fn extract(&self, path: &Path, guidance: &str) -> Result<Document> {
        let parse_error = |message: String| {
            error!(path = %path.display(), %message, "LlamaParse extraction failed");
            RagError::DocumentParse { path: path.display().to_string(), message }
        };

        let job_id = self.upload(path, guidance).await.map_err(parse_error)?;
        debug!(path = %path.display(), job = %job_id, "uploaded document");
        self.wait_for(&job_id).await.map_err(parse_error)?;
        let markdown = self.fetch_markdown(&job_id).await.map_err(parse_error)?;

        info!(path = %path.display(), job = %job_id, chars = markdown.len(), "parsed document");
        Ok(Document { source: path.to_path_buf(), markdown })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_parsing() {
        assert_eq!(JobStatus::parse("SUCCESS"), JobStatus::Success);
        assert_eq!(JobStatus::parse("ERROR"), JobStatus::Failed);
        assert_eq!(JobStatus::parse("CANCELED"), JobStatus::Failed);
        assert_eq!(JobStatus::parse("PENDING"), JobStatus::Pending);
    }

    #[test]
    fn upload_response_parses() {
        let job: JobResponse =
            serde_json::from_str(r#"{"id":"job-1","status":"PENDING"}"#).unwrap();
        assert_eq!(job.id, "job-1");
        let result: MarkdownResult =
            serde_json::from_str(r##"{"markdown":"# Title","job_metadata":{}}"##).unwrap();
        assert_eq!(result.markdown, "# Title");
    }

    #[tokio::test]
    async fn missing_file_is_a_parse_error() {
        let extractor = LlamaParseExtractor::new("llx-test").unwrap();
        let err = extractor.extract(Path::new("/nonexistent/report.pdf"), "").await.unwrap_err();
        assert!(matches!(err, RagError::DocumentParse { .. }));
    }
}
