//! Chat controller — the message lifecycle state machine.
//!
//! DESIGN
//! ======
//! `ChatController` owns the conversation: message log, loading flag,
//! webhook config, streaming preference, and session id. A send moves
//! through admit → respond → settle:
//!
//! - admit: reject blank input or a send while loading, otherwise append the
//!   user message plus an assistant placeholder and raise `loading`.
//! - respond: await the selected `ResponseSource` with no lock held.
//! - settle: write the reply directly, or start a reveal that finishes the
//!   placeholder later; failures turn the placeholder into an error.
//!
//! State sits behind one `std::sync::Mutex` that is never held across an
//! `.await`. Every mutation republishes a `ChatSnapshot` on a watch channel
//! for the presentation layer.
//!
//! TRADE-OFFS
//! ==========
//! `stop`, `clear_all`, and `set_webhook_url` bump an epoch instead of
//! aborting an in-flight request. A reply that lands after the epoch moved
//! is dropped on arrival. History is persisted on structural changes and
//! terminal states, not on every reveal tick; a restart mid-reveal is
//! repaired by the load-time normalization.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::message::{Message, MessageLog, MessageStatus};
use crate::responder::webhook::build_http_client;
use crate::responder::{DemoResponder, Prompt, Responder, ResponderError, ResponseSource, WebhookConfig};
use crate::store::ChatStorage;
use crate::streaming::{self, Pacing, RevealSink, StreamHandle};

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

// =============================================================================
// TYPES
// =============================================================================

/// Point-in-time view of the conversation for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub loading: bool,
    pub webhook: WebhookConfig,
    pub streaming_enabled: bool,
    pub session_id: String,
}

/// How a `send` (or `retry`) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, a send already in flight, or nothing to retry.
    Ignored,
    /// The reply is being revealed; `wait_idle` resolves when it is done.
    Revealing,
    /// The reply was written in full.
    Completed,
    /// The placeholder now carries an error.
    Failed,
    /// The reply arrived after a stop, clear, or URL change and was dropped.
    Superseded,
}

struct Inner {
    messages: MessageLog,
    loading: bool,
    webhook: WebhookConfig,
    streaming_enabled: bool,
    session_id: String,
    /// Bumped whenever in-flight replies must be discarded.
    epoch: u64,
    active_stream: Option<StreamHandle>,
}

impl Inner {
    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.messages.as_slice().to_vec(),
            loading: self.loading,
            webhook: self.webhook.clone(),
            streaming_enabled: self.streaming_enabled,
            session_id: self.session_id.clone(),
        }
    }

    fn cancel_stream(&mut self) -> bool {
        match self.active_stream.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_stream();
    }
}

struct Shared {
    inner: Mutex<Inner>,
    storage: ChatStorage,
    http: reqwest::Client,
    demo: DemoResponder,
    pacing: Pacing,
    snapshots: watch::Sender<ChatSnapshot>,
}

/// Accepted send, carried from admit to settle.
struct Ticket {
    text: String,
    assistant_id: String,
    session_id: String,
    source: ResponseSource,
    stream: bool,
    epoch: u64,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Handle to one chat session. Clones share the same conversation.
#[derive(Clone)]
pub struct ChatController {
    shared: Arc<Shared>,
}

impl ChatController {
    /// Hydrate a controller from `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::HttpClientBuild`] if the webhook HTTP client
    /// cannot be built.
    pub fn new(storage: ChatStorage, config: &Config) -> Result<Self, ResponderError> {
        let http = build_http_client(config.timeouts)?;
        let inner = Inner {
            messages: storage.load_messages(),
            loading: false,
            webhook: WebhookConfig::new(&storage.webhook_url()),
            streaming_enabled: storage.streaming_enabled(),
            session_id: storage.session_id(),
            epoch: 0,
            active_stream: None,
        };
        info!(
            messages = inner.messages.len(),
            connected = inner.webhook.is_connected(),
            streaming = inner.streaming_enabled,
            "chat session restored"
        );
        let (snapshots, _) = watch::channel(inner.snapshot());
        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                storage,
                http,
                demo: DemoResponder::new(config.think_time),
                pacing: config.pacing,
                snapshots,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock()
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.lock().snapshot()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.shared.snapshots.subscribe()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.as_slice().to_vec()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    #[must_use]
    pub fn webhook(&self) -> WebhookConfig {
        self.lock().webhook.clone()
    }

    #[must_use]
    pub fn streaming_enabled(&self) -> bool {
        self.lock().streaming_enabled
    }

    #[must_use]
    pub fn session_id(&self) -> String {
        self.lock().session_id.clone()
    }

    /// HTTP client shared with the webhook responder.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.shared.http
    }

    /// Resolve once no reveal is running.
    pub async fn wait_idle(&self) {
        let done = self.lock().active_stream.as_ref().map(StreamHandle::done_signal);
        if let Some(done) = done {
            streaming::wait_done(done).await;
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Submit `text` as a user turn. Blank input and sends while another one
    /// is in flight are ignored.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let Some(ticket) = self.admit(text) else {
            return SendOutcome::Ignored;
        };
        let result = ticket.source.respond(Prompt { text: &ticket.text, session_id: &ticket.session_id }).await;
        self.settle(ticket, result)
    }

    /// Drop the trailing assistant reply and re-send the latest user message.
    pub async fn retry(&self) -> SendOutcome {
        let text = {
            let mut inner = self.lock();
            if inner.loading {
                return SendOutcome::Ignored;
            }
            let Some(text) = inner.messages.last_user().map(|m| m.content.clone()) else {
                return SendOutcome::Ignored;
            };
            inner.messages.pop_trailing_assistant();
            self.shared.persist_and_publish(&inner);
            text
        };
        info!(len = text.len(), "chat: retrying last message");
        self.send(&text).await
    }

    /// Halt any reveal, complete whatever is still streaming, and release the
    /// loading flag. Returns `false` when there was nothing to stop.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        let cancelled = inner.cancel_stream();
        let completed = inner.messages.complete_streaming();
        let was_loading = inner.loading;
        if !cancelled && completed == 0 && !was_loading {
            return false;
        }
        if was_loading {
            inner.epoch += 1;
        }
        inner.loading = false;
        info!(cancelled, completed, "chat: stopped");
        self.shared.persist_and_publish(&inner);
        true
    }

    /// Start a fresh conversation: drop history and rotate the session id.
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        self.shared.reset_conversation(&mut inner);
        info!(session_id = %inner.session_id, "chat: cleared");
        self.shared.publish(&inner);
    }

    /// Point the session at a new backend. An empty URL returns to demo mode.
    /// Any change, including re-saving the same URL, starts a fresh
    /// conversation.
    pub fn set_webhook_url(&self, url: &str) {
        let webhook = WebhookConfig::new(url);
        self.shared.storage.save_webhook_url(webhook.url());
        let mut inner = self.lock();
        inner.webhook = webhook;
        self.shared.reset_conversation(&mut inner);
        info!(
            connected = inner.webhook.is_connected(),
            session_id = %inner.session_id,
            "chat: webhook updated"
        );
        self.shared.publish(&inner);
    }

    /// Flip the streaming preference. Sends already in flight keep the mode
    /// they started with. Returns the new value.
    pub fn toggle_streaming(&self) -> bool {
        let mut inner = self.lock();
        inner.streaming_enabled = !inner.streaming_enabled;
        self.shared.storage.save_streaming_enabled(inner.streaming_enabled);
        debug!(enabled = inner.streaming_enabled, "chat: streaming toggled");
        self.shared.publish(&inner);
        inner.streaming_enabled
    }

    // -------------------------------------------------------------------------
    // Send phases
    // -------------------------------------------------------------------------

    fn admit(&self, text: &str) -> Option<Ticket> {
        let text = text.trim();
        let mut inner = self.lock();
        if text.is_empty() || inner.loading {
            return None;
        }

        inner.loading = true;
        inner.messages.push(Message::user(text));
        let placeholder_status =
            if inner.streaming_enabled { MessageStatus::Streaming } else { MessageStatus::Complete };
        let placeholder = Message::assistant_placeholder(placeholder_status);
        let assistant_id = placeholder.id.clone();
        inner.messages.push(placeholder);

        let source = ResponseSource::select(&inner.webhook, &self.shared.demo, &self.shared.http);
        info!(source = source.kind(), len = text.len(), session_id = %inner.session_id, "chat: message accepted");
        self.shared.persist_and_publish(&inner);

        Some(Ticket {
            text: text.to_string(),
            assistant_id,
            session_id: inner.session_id.clone(),
            source,
            stream: inner.streaming_enabled,
            epoch: inner.epoch,
        })
    }

    fn settle(&self, ticket: Ticket, result: Result<String, ResponderError>) -> SendOutcome {
        let mut inner = self.lock();
        if inner.epoch != ticket.epoch || inner.messages.get(&ticket.assistant_id).is_none() {
            debug!(message_id = %ticket.assistant_id, "chat: reply superseded; dropping");
            return SendOutcome::Superseded;
        }

        match result {
            Ok(reply) if ticket.stream => {
                let sink: Arc<dyn RevealSink> = Arc::new(ControllerSink(Arc::downgrade(&self.shared)));
                let handle = streaming::start(ticket.assistant_id, reply, self.shared.pacing, sink);
                inner.active_stream = Some(handle);
                SendOutcome::Revealing
            }
            Ok(reply) => {
                inner.messages.update(&ticket.assistant_id, |m| {
                    m.content = reply;
                    m.status = MessageStatus::Complete;
                });
                inner.loading = false;
                self.shared.persist_and_publish(&inner);
                SendOutcome::Completed
            }
            Err(e) => {
                warn!(error = %e, source = ticket.source.kind(), "chat: reply failed");
                inner.messages.update(&ticket.assistant_id, |m| {
                    m.content = format!("Error: {e}. Check your webhook URL and try again.");
                    m.status = MessageStatus::Error;
                });
                inner.loading = false;
                self.shared.persist_and_publish(&inner);
                SendOutcome::Failed
            }
        }
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.snapshot());
    }

    fn persist_and_publish(&self, inner: &Inner) {
        self.storage.save_messages(inner.messages.as_slice());
        self.publish(inner);
    }

    fn reset_conversation(&self, inner: &mut Inner) {
        inner.cancel_stream();
        inner.messages.clear();
        inner.loading = false;
        inner.epoch += 1;
        self.storage.erase_messages();
        inner.session_id = self.storage.rotate_session_id();
    }
}

/// Routes reveal progress back into the controller. Holds a weak reference
/// so a running reveal does not keep a dropped controller alive.
struct ControllerSink(Weak<Shared>);

impl RevealSink for ControllerSink {
    fn reveal(&self, message_id: &str, prefix: &str) -> bool {
        let Some(shared) = self.0.upgrade() else {
            return false;
        };
        let mut inner = shared.lock();
        let streaming = inner.messages.get(message_id).is_some_and(|m| m.status == MessageStatus::Streaming);
        if !streaming {
            return false;
        }
        inner.messages.update(message_id, |m| m.content = prefix.to_string());
        shared.publish(&inner);
        true
    }

    fn finish(&self, message_id: &str, full: &str) {
        let Some(shared) = self.0.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        let streaming = inner.messages.get(message_id).is_some_and(|m| m.status == MessageStatus::Streaming);
        if !streaming {
            return;
        }
        inner.messages.update(message_id, |m| {
            m.content = full.to_string();
            m.status = MessageStatus::Complete;
        });
        if inner.active_stream.as_ref().is_some_and(|h| h.message_id() == message_id) {
            // The task is finishing on its own; dropping the handle detaches it.
            inner.active_stream = None;
        }
        inner.loading = false;
        debug!(message_id, len = full.len(), "chat: reveal complete");
        shared.persist_and_publish(&inner);
    }
}
