//! VoltChat — a chat client that talks to a demo responder or a user-supplied
//! webhook, revealing replies with a simulated token stream.
//!
//! DESIGN
//! ======
//! Layers, leaf to root: `store` (session + durable key-value scopes),
//! `message` (the ordered log), `responder` (demo or webhook replies),
//! `streaming` (cancellable reveal), `controller` (the lifecycle hub).
//! `render` and `repl` are the terminal presentation layer.

pub mod config;
pub mod controller;
pub mod message;
pub mod render;
pub mod repl;
pub mod responder;
pub mod store;
pub mod streaming;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::Config;
pub use controller::{ChatController, ChatSnapshot, SendOutcome};
pub use message::{Message, MessageStatus, Role};
pub use store::ChatStorage;
