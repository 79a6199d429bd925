//! Responder — where assistant replies come from.
//!
//! DESIGN
//! ======
//! `Responder` is the provider-neutral contract: user text in, reply text
//! out. Two implementations exist: `DemoResponder` answers locally from a
//! canned pool, `WebhookResponder` POSTs to a user-configured endpoint.
//! `ResponseSource` picks one from the current `WebhookConfig` so the
//! controller never branches on mode itself.

pub mod demo;
pub mod webhook;

pub use demo::DemoResponder;
pub use webhook::WebhookResponder;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while fetching a reply. The `Display` text is shown to the
/// user inside the failed assistant message.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("{0}")]
    Request(String),

    /// The webhook answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The webhook body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Parse(String),
}

// =============================================================================
// WEBHOOK CONFIG
// =============================================================================

/// Configured backend. An empty URL means demo mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookConfig {
    url: String,
}

impl WebhookConfig {
    /// Build from raw user input; surrounding whitespace is dropped.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self { url: url.trim().to_string() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Derived from the URL; there is no separate flag to drift.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.url.is_empty()
    }
}

// =============================================================================
// RESPONDER TRAIT
// =============================================================================

/// What a responder gets to work with for one turn.
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub text: &'a str,
    pub session_id: &'a str,
}

/// Provider-neutral async reply source. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    /// Produce the full reply for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResponderError`] if the backend is unreachable, rejects
    /// the request, or answers with something that is not JSON.
    async fn respond(&self, prompt: Prompt<'_>) -> Result<String, ResponderError>;
}

// =============================================================================
// SOURCE DISPATCH
// =============================================================================

#[derive(Clone)]
pub enum ResponseSource {
    Demo(DemoResponder),
    Webhook(WebhookResponder),
}

impl ResponseSource {
    /// Demo when no URL is configured, webhook otherwise.
    #[must_use]
    pub fn select(config: &WebhookConfig, demo: &DemoResponder, http: &reqwest::Client) -> Self {
        if config.is_connected() {
            Self::Webhook(WebhookResponder::new(http.clone(), config.url()))
        } else {
            Self::Demo(demo.clone())
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Demo(_) => "demo",
            Self::Webhook(_) => "webhook",
        }
    }
}

#[async_trait::async_trait]
impl Responder for ResponseSource {
    async fn respond(&self, prompt: Prompt<'_>) -> Result<String, ResponderError> {
        match self {
            Self::Demo(r) => r.respond(prompt).await,
            Self::Webhook(r) => r.respond(prompt).await,
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
