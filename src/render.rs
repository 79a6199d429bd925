//! Terminal rendering of chat snapshots.
//!
//! `TranscriptRenderer` turns a sequence of snapshots into the text that
//! should be appended to the terminal: the prefix of an assistant reply the
//! first time it shows up, then only the newly revealed tail on each
//! subsequent snapshot. User lines are never echoed; the terminal already
//! shows what was typed.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use time::macros::format_description;

use crate::controller::ChatSnapshot;
use crate::message::{Message, MessageStatus, Role};

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;

pub const REPLY_PREFIX: &str = "volt> ";
pub const ERROR_PREFIX: &str = "volt! ";
pub const RETRY_HINT: &str = "      (type /retry to try again)";

#[derive(Debug, Default)]
pub struct TranscriptRenderer {
    /// Messages fully written to the terminal.
    finished: HashSet<String>,
    /// Replies partially written: id -> bytes already printed.
    open: HashMap<String, usize>,
}

impl TranscriptRenderer {
    /// Start after `snapshot`: everything already settled counts as printed.
    #[must_use]
    pub fn resume(snapshot: &ChatSnapshot) -> Self {
        let finished =
            snapshot.messages.iter().filter(|m| m.status.is_terminal()).map(|m| m.id.clone()).collect();
        Self { finished, open: HashMap::new() }
    }

    /// Text to append for the transition to `snapshot`.
    pub fn render(&mut self, snapshot: &ChatSnapshot) -> String {
        if snapshot.messages.is_empty() {
            self.finished.clear();
            self.open.clear();
            return String::new();
        }

        let mut out = String::new();
        for message in &snapshot.messages {
            if self.finished.contains(&message.id) {
                continue;
            }
            match message.role {
                Role::User => {
                    if message.status.is_terminal() {
                        self.finished.insert(message.id.clone());
                    }
                }
                Role::Assistant => self.render_reply(message, snapshot.loading, &mut out),
            }
        }
        out
    }

    /// An empty reply is still pending while `loading`; without streaming the
    /// placeholder is already `Complete` before the answer is written.
    fn render_reply(&mut self, message: &Message, loading: bool, out: &mut String) {
        if message.status == MessageStatus::Error {
            if self.open.remove(&message.id).is_some_and(|printed| printed > 0) {
                out.push('\n');
            }
            let _ = writeln!(out, "{ERROR_PREFIX}{}", message.content);
            out.push_str(RETRY_HINT);
            out.push('\n');
            self.finished.insert(message.id.clone());
            return;
        }

        let printed = match self.open.get(&message.id) {
            Some(&printed) => printed,
            None if message.content.is_empty() && (loading || !message.status.is_terminal()) => return,
            None => {
                out.push_str(REPLY_PREFIX);
                0
            }
        };
        out.push_str(message.content.get(printed..).unwrap_or(""));
        self.open.insert(message.id.clone(), message.content.len().max(printed));

        if message.status.is_terminal() {
            out.push('\n');
            self.open.remove(&message.id);
            self.finished.insert(message.id.clone());
        }
    }
}

/// One history line: `[HH:MM] who: content`.
#[must_use]
pub fn format_message(message: &Message) -> String {
    let clock = message
        .timestamp
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "--:--".into());
    let who = match (message.role, message.status) {
        (Role::User, _) => "you",
        (Role::Assistant, MessageStatus::Error) => "volt (error)",
        (Role::Assistant, _) => "volt",
    };
    format!("[{clock}] {who}: {}", message.content)
}

/// One-line summary of the session.
#[must_use]
pub fn format_status(snapshot: &ChatSnapshot) -> String {
    let mode = if snapshot.webhook.is_connected() {
        format!("webhook ({})", snapshot.webhook.url())
    } else {
        "demo".to_string()
    };
    format!(
        "mode: {mode} | streaming: {} | messages: {} | session: {}",
        if snapshot.streaming_enabled { "on" } else { "off" },
        snapshot.messages.len(),
        snapshot.session_id,
    )
}
