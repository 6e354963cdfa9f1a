//! Slack notification sink.
//!
//! This module is only available when the `slack` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ServiceConfig;
use crate::error::{RagError, Result};
use crate::http;
use crate::notify::Notifier;

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Posts messages to a Slack channel with `chat.postMessage`.
pub struct SlackNotifier {
    client: reqwest::Client,
    token: String,
    url: String,
    channel: String,
    username: String,
}

impl SlackNotifier {
    /// Create a notifier posting to `#testing` as `Zania Rag Bot`.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(RagError::Config("Slack token must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            token,
            url: SLACK_POST_MESSAGE_URL.into(),
            channel: "testing".into(),
            username: "Zania Rag Bot".into(),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let token = ServiceConfig::require(&config.slack_token, "SLACK_BOT_TOKEN")?;
        Ok(Self::new(token)?
            .with_channel(&config.slack_channel)
            .with_username(&config.slack_username)
            .with_client(http::client(config.request_timeout())?))
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Post to a different `chat.postMessage` endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn error(message: impl Into<String>) -> RagError {
        RagError::Notification { sink: "Slack".into(), message: message.into() }
    }
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    username: &'a str,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn check_response(response: PostMessageResponse) -> Result<()> {
    if response.ok {
        Ok(())
    } else {
        Err(SlackNotifier::error(response.error.unwrap_or_else(|| "unknown error".into())))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        debug!(sink = "Slack", channel = %self.channel, "posting message");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&PostMessage { channel: &self.channel, text, username: &self.username })
            .send()
            .await
            .map_err(|e| {
                error!(sink = "Slack", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = http::failure(response).await;
            error!(sink = "Slack", %message, "chat.postMessage error");
            return Err(Self::error(message));
        }

        let body: PostMessageResponse = response.json().await.map_err(|e| {
            error!(sink = "Slack", error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;
        check_response(body)
    }

    fn name(&self) -> &str {
        "Slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_false_is_a_notification_error() {
        let body: PostMessageResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        let err = check_response(body).unwrap_err();
        assert!(matches!(err, RagError::Notification { .. }));
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn ok_true_is_accepted() {
        let body: PostMessageResponse =
            serde_json::from_str(r#"{"ok":true,"channel":"C1","ts":"1.2"}"#).unwrap();
        assert!(check_response(body).is_ok());
    }

    #[test]
    fn request_body_matches_chat_post_message() {
        let body = serde_json::to_value(PostMessage {
            channel: "testing",
            text: "hi",
            username: "Zania Rag Bot",
        })
        .unwrap();
        assert_eq!(body["channel"], "testing");
        assert_eq!(body["username"], "Zania Rag Bot");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_notification_error() {
        let notifier = SlackNotifier::new("xoxb-test")
            .unwrap()
            .with_url("http://127.0.0.1:9/api/chat.postMessage");
        let err = notifier.notify("hello").await.unwrap_err();
        assert_eq!(err.phase(), "notification");
    }
}
