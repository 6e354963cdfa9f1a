//! Shared plumbing for the HTTP-backed providers.

use std::time::Duration;

use serde_json::Value;

use crate::error::{RagError, Result};

/// Build a client that applies `timeout` to every request.
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
}

/// Read a failed response and describe it as `"<status>: <detail>"`.
pub(crate) async fn failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("API returned {status}: {}", error_detail(&body))
}

/// Pull the human-readable message out of the error bodies the providers use.
pub(crate) fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let candidates = [
        value.pointer("/error/message"),
        value.get("message"),
        value.get("detail"),
        value.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
