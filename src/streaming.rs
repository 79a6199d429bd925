//! Streaming simulator — reveal an already-received reply a few characters at
//! a time.
//!
//! DESIGN
//! ======
//! `start` spawns one tokio task per reveal. Each tick sleeps a jittered
//! delay, then grows the visible prefix by a jittered number of characters
//! and hands it to a `RevealSink`. Prefixes only ever grow and always end on
//! a char boundary. When the prefix covers the whole reply the sink gets
//! `finish` and the task exits.
//!
//! The returned `StreamHandle` is the only way to stop a reveal early.
//! Cancelling leaves the sink holding the last revealed prefix; marking the
//! message complete is the owner's job.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{DEFAULT_CHUNK_MAX, DEFAULT_CHUNK_MIN, DEFAULT_TICK_MAX_MS, DEFAULT_TICK_MIN_MS};

#[cfg(test)]
#[path = "streaming_test.rs"]
mod tests;

// =============================================================================
// PACING
// =============================================================================

/// Chunk and delay bounds for a reveal. Both ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub chunk_min: usize,
    pub chunk_max: usize,
    pub tick_min: Duration,
    pub tick_max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            chunk_min: DEFAULT_CHUNK_MIN,
            chunk_max: DEFAULT_CHUNK_MAX,
            tick_min: Duration::from_millis(DEFAULT_TICK_MIN_MS),
            tick_max: Duration::from_millis(DEFAULT_TICK_MAX_MS),
        }
    }
}

impl Pacing {
    /// Swap inverted bounds and keep chunks at least one character.
    #[must_use]
    pub fn normalized(self) -> Self {
        let (chunk_min, chunk_max) = ordered(self.chunk_min.max(1), self.chunk_max.max(1));
        let (tick_min, tick_max) = ordered(self.tick_min, self.tick_max);
        Self { chunk_min, chunk_max, tick_min, tick_max }
    }

    fn next_chunk(&self) -> usize {
        rand::rng().random_range(self.chunk_min..=self.chunk_max)
    }

    fn next_delay(&self) -> Duration {
        if self.tick_min == self.tick_max {
            return self.tick_min;
        }
        rand::rng().random_range(self.tick_min..=self.tick_max)
    }
}

fn ordered<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

// =============================================================================
// SINK
// =============================================================================

/// Receives reveal progress for one message.
pub trait RevealSink: Send + Sync + 'static {
    /// A longer prefix is visible. Return `false` to end the reveal (the
    /// target is gone or no longer streaming).
    fn reveal(&self, message_id: &str, prefix: &str) -> bool;

    /// The whole reply is visible.
    fn finish(&self, message_id: &str, full: &str);
}

// =============================================================================
// HANDLE
// =============================================================================

/// Owner's grip on a running reveal.
pub struct StreamHandle {
    message_id: String,
    task: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

impl StreamHandle {
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Abort the reveal at its next tick boundary. Idempotent.
    pub fn cancel(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A receiver that flips to `true` when the reveal runs to completion.
    /// A cancelled reveal drops the sender instead.
    #[must_use]
    pub fn done_signal(&self) -> watch::Receiver<bool> {
        self.done.clone()
    }
}

/// Wait on a `done_signal` until the reveal finishes or is cancelled.
pub async fn wait_done(mut done: watch::Receiver<bool>) {
    let _ = done.wait_for(|finished| *finished).await;
}

// =============================================================================
// REVEAL
// =============================================================================

/// Start revealing `full` into `message_id`. Must be called inside a tokio
/// runtime.
pub fn start(message_id: String, full: String, pacing: Pacing, sink: Arc<dyn RevealSink>) -> StreamHandle {
    let pacing = pacing.normalized();
    let (done_tx, done_rx) = watch::channel(false);
    let id = message_id.clone();

    let task = tokio::spawn(async move {
        // Byte offset of every char boundary, including the end.
        let boundaries: Vec<usize> =
            full.char_indices().map(|(i, _)| i).chain(std::iter::once(full.len())).collect();
        let total = boundaries.len() - 1;
        let mut revealed = 0;
        let mut ticks = 0u32;

        while revealed < total {
            tokio::time::sleep(pacing.next_delay()).await;
            revealed = (revealed + pacing.next_chunk()).min(total);
            ticks += 1;
            if revealed == total {
                break;
            }
            if !sink.reveal(&id, &full[..boundaries[revealed]]) {
                debug!(message_id = %id, ticks, "reveal target gone; stopping");
                return;
            }
        }

        sink.finish(&id, &full);
        debug!(message_id = %id, ticks, len = full.len(), "reveal finished");
        let _ = done_tx.send(true);
    });

    StreamHandle { message_id, task, done: done_rx }
}
