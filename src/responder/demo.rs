//! Demo responder — canned replies when no webhook is configured.

use std::time::Duration;

use rand::Rng;

use super::{Prompt, Responder, ResponderError};

pub const GREETING: &str = "Connected. Ready. What can I help you build today?";

pub const WEBHOOK_HINT: &str = "Use /webhook <url> to configure your webhook URL. VoltChat will POST your messages \
                                and display responses with simulated streaming.";

pub const DEMO_RESPONSES: [&str; 5] = [
    "I'm VoltChat running in demo mode. Configure a webhook URL to connect to your AI backend.",
    "This is a simulated response. Your message was received instantly, that's the VoltChat difference.",
    "Demo mode active. Set up your webhook endpoint to see real AI responses with the same electric speed.",
    "Still in demo mode. Connect your webhook and I'll stop making things up.",
    "No webhook configured. I'm showing you how fast responses feel in VoltChat. Ready to connect your backend?",
];

#[derive(Debug, Clone)]
pub struct DemoResponder {
    think_time: Duration,
}

impl DemoResponder {
    #[must_use]
    pub fn new(think_time: Duration) -> Self {
        Self { think_time }
    }

    #[must_use]
    pub fn think_time(&self) -> Duration {
        self.think_time
    }
}

#[async_trait::async_trait]
impl Responder for DemoResponder {
    async fn respond(&self, prompt: Prompt<'_>) -> Result<String, ResponderError> {
        tokio::time::sleep(self.think_time).await;
        Ok(demo_reply(prompt.text).to_string())
    }
}

/// Pick the canned reply for `input`. Matching is by lowercase substring,
/// so "this" counts as a greeting just like "hi".
#[must_use]
pub fn demo_reply(input: &str) -> &'static str {
    let lower = input.to_lowercase();
    if lower.contains("hello") || lower.contains("hi") {
        return GREETING;
    }
    if lower.contains("webhook") {
        return WEBHOOK_HINT;
    }
    DEMO_RESPONSES[rand::rng().random_range(0..DEMO_RESPONSES.len())]
}
