//! Webhook responder — one JSON POST per user turn.
//!
//! Thin HTTP wrapper around a user-supplied endpoint. Reply extraction lives
//! in `extract_reply` so it can be tested without a server.

use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use super::{Prompt, Responder, ResponderError};
use crate::config::HttpTimeouts;

pub const CONNECTION_TEST_MESSAGE: &str = "VoltChat connection test";

// =============================================================================
// CLIENT
// =============================================================================

/// Build the shared HTTP client with the configured timeouts.
///
/// # Errors
///
/// Returns [`ResponderError::HttpClientBuild`] if reqwest cannot build it.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<reqwest::Client, ResponderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| ResponderError::HttpClientBuild(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct WebhookResponder {
    http: reqwest::Client,
    url: String,
}

impl WebhookResponder {
    #[must_use]
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self { http, url: url.to_string() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Responder for WebhookResponder {
    async fn respond(&self, prompt: Prompt<'_>) -> Result<String, ResponderError> {
        let body = WebhookRequest {
            message: prompt.text,
            timestamp: now_rfc3339(),
            session_id: Some(prompt.session_id),
            test: None,
        };
        debug!(url = %self.url, len = prompt.text.len(), "webhook: posting message");
        let text = post(&self.http, &self.url, &body).await?;
        let json: Value = serde_json::from_str(&text).map_err(|e| ResponderError::Parse(e.to_string()))?;
        Ok(extract_reply(&json))
    }
}

/// POST the fixed test payload to `url`. Only the status is inspected.
///
/// # Errors
///
/// Returns [`ResponderError::Request`] if the endpoint is unreachable, or
/// [`ResponderError::Status`] for a non-2xx answer.
pub async fn test_connection(http: &reqwest::Client, url: &str) -> Result<(), ResponderError> {
    let url = url.trim();
    let body = WebhookRequest {
        message: CONNECTION_TEST_MESSAGE,
        timestamp: now_rfc3339(),
        session_id: None,
        test: Some(true),
    };
    post(http, url, &body).await.map(|_| ())
}

async fn post(http: &reqwest::Client, url: &str, body: &WebhookRequest<'_>) -> Result<String, ResponderError> {
    let response = http
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| ResponderError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "webhook: non-success status");
        return Err(ResponderError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    response.text().await.map_err(|e| ResponderError::Request(e.to_string()))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
    message: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test: Option<bool>,
}

// =============================================================================
// PARSING
// =============================================================================

/// Pull the reply text out of a webhook body. Tries `output.response`,
/// `output` (string), `response`, `message`, `content` in that order; empty
/// strings are skipped. Anything else is shown as the raw JSON.
#[must_use]
pub fn extract_reply(json: &Value) -> String {
    let candidates = [
        json.get("output").and_then(|o| o.get("response")),
        json.get("output"),
        json.get("response"),
        json.get("message"),
        json.get("content"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map_or_else(|| json.to_string(), str::to_string)
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
