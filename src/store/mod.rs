//! Store — key-value persistence over a session scope and a durable scope.
//!
//! DESIGN
//! ======
//! The chat controller never touches files or globals directly. It talks to
//! two injected `KeyValueStore`s: a session scope that lives as long as the
//! process (holding the session identifier) and a durable scope that
//! survives restarts (webhook URL, history, streaming preference).
//! `ChatStorage` layers the typed VoltChat keys on top of both.
//!
//! TRADE-OFFS
//! ==========
//! Every accessor is best-effort. Read failures fall back to defaults and
//! write failures are logged, never returned: a broken disk must not wedge
//! the conversation.

pub mod file;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;
use uuid::Uuid;

use crate::message::{self, Message, MessageLog};

pub use file::FileStore;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const WEBHOOK_URL_KEY: &str = "voltchat-webhook-url";
pub const MESSAGES_KEY: &str = "voltchat-messages";
pub const STREAMING_KEY: &str = "voltchat-streaming";
pub const SESSION_ID_KEY: &str = "voltchat-session-id";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encode failed: {0}")]
    Encode(String),
}

// =============================================================================
// KEY-VALUE STORE
// =============================================================================

/// String key-value storage. Implementations must be safe to share between
/// the controller and its reveal task.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-lifetime store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// CHAT STORAGE
// =============================================================================

/// Typed access to the VoltChat keys across both scopes.
#[derive(Clone)]
pub struct ChatStorage {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl ChatStorage {
    #[must_use]
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    /// Both scopes in memory. Used by tests and throwaway sessions.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Saved webhook URL, or empty for demo mode.
    #[must_use]
    pub fn webhook_url(&self) -> String {
        read(&*self.durable, WEBHOOK_URL_KEY).unwrap_or_default()
    }

    pub fn save_webhook_url(&self, url: &str) {
        write(&*self.durable, WEBHOOK_URL_KEY, url);
    }

    /// Persisted history. A malformed payload is logged and discarded.
    #[must_use]
    pub fn load_messages(&self) -> MessageLog {
        let Some(raw) = read(&*self.durable, MESSAGES_KEY) else {
            return MessageLog::new();
        };
        match message::decode_history(&raw) {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "failed to parse saved messages; starting empty");
                MessageLog::new()
            }
        }
    }

    /// Persist history. An empty history removes the key.
    pub fn save_messages(&self, messages: &[Message]) {
        if messages.is_empty() {
            self.erase_messages();
            return;
        }
        match message::encode_history(messages) {
            Ok(json) => write(&*self.durable, MESSAGES_KEY, &json),
            Err(e) => warn!(error = %e, count = messages.len(), "failed to encode messages"),
        }
    }

    pub fn erase_messages(&self) {
        if let Err(e) = self.durable.remove(MESSAGES_KEY) {
            warn!(error = %e, key = MESSAGES_KEY, "store remove failed");
        }
    }

    /// Streaming preference; on unless explicitly turned off.
    #[must_use]
    pub fn streaming_enabled(&self) -> bool {
        read(&*self.durable, STREAMING_KEY)
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(true)
    }

    pub fn save_streaming_enabled(&self, enabled: bool) {
        write(&*self.durable, STREAMING_KEY, if enabled { "true" } else { "false" });
    }

    /// Session identifier for this scope, created on first access.
    #[must_use]
    pub fn session_id(&self) -> String {
        match read(&*self.session, SESSION_ID_KEY) {
            Some(id) if !id.is_empty() => id,
            _ => self.rotate_session_id(),
        }
    }

    /// Issue and store a fresh session identifier.
    #[must_use]
    pub fn rotate_session_id(&self) -> String {
        let id = Uuid::new_v4().to_string();
        write(&*self.session, SESSION_ID_KEY, &id);
        id
    }
}

fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, key, "store read failed");
            None
        }
    }
}

fn write(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(e) = store.set(key, value) {
        warn!(error = %e, key, "store write failed");
    }
}
