//! Interactive prompt — reads lines, dispatches slash commands, and follows
//! controller snapshots to print replies as they are revealed.
//!
//! DESIGN
//! ======
//! Sends and connection tests run on spawned tasks so the input loop stays
//! responsive and `/stop` can land mid-reveal. A separate render task owns the
//! `TranscriptRenderer` and prints whatever text each snapshot adds. At end
//! of input the loop waits for the last reply before returning, so piped
//! input (`echo hi | voltchat`) prints its answer; `/quit` stops instead.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::controller::{ChatController, ChatSnapshot, SendOutcome};
use crate::render::{TranscriptRenderer, format_message, format_status};
use crate::responder::webhook::test_connection;

#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

pub const HELP: &str = "\
Type a message and press enter to send it.

  /retry          re-send the last message
  /stop           stop the reply in progress
  /clear          start a new chat
  /webhook <url>  use a webhook backend (no url: back to demo mode)
  /test [url]     check that a webhook answers
  /stream         toggle streamed replies
  /status         show mode, streaming, and session
  /history        print this chat
  /help           show this help
  /quit           exit";

// =============================================================================
// COMMANDS
// =============================================================================

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Send(String),
    Retry,
    Stop,
    Clear,
    /// Empty string disconnects.
    Webhook(String),
    Test(Option<String>),
    Stream,
    Status,
    History,
    Help,
    Quit,
    Unknown(String),
}

/// Parse a line of input. Anything not starting with `/` is a message.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name.to_ascii_lowercase().as_str() {
        "retry" => Command::Retry,
        "stop" => Command::Stop,
        "clear" | "new" => Command::Clear,
        "webhook" => Command::Webhook(arg.to_string()),
        "test" => Command::Test((!arg.is_empty()).then(|| arg.to_string())),
        "stream" => Command::Stream,
        "status" => Command::Status,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    }
}

// =============================================================================
// LOOP
// =============================================================================

/// Terminal output shared by the input loop and the render task.
pub type Output = Arc<Mutex<dyn Write + Send>>;

/// Drive the chat from `input` until it ends or `/quit` is entered, printing
/// to stdout.
///
/// # Errors
///
/// Returns any I/O error from reading `input`.
pub async fn run<R>(controller: &ChatController, input: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    run_with_output(controller, input, Arc::new(Mutex::new(std::io::stdout()))).await
}

/// Like [`run`], writing everything to `out`.
///
/// # Errors
///
/// Returns any I/O error from reading `input`.
pub async fn run_with_output<R>(controller: &ChatController, input: R, out: Output) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let render_task = spawn_renderer(controller, out.clone(), shutdown_rx);

    let mut lines = input.lines();
    let mut inflight: Option<JoinHandle<SendOutcome>> = None;
    let mut quit = false;

    while let Some(line) = lines.next_line().await? {
        let busy = controller.is_loading() || inflight.as_ref().is_some_and(|task| !task.is_finished());
        match parse_command(&line) {
            Command::Empty => {}
            Command::Send(text) => {
                if busy {
                    say(&out, "Still replying. Use /stop to cancel.");
                } else {
                    let controller = controller.clone();
                    inflight = Some(tokio::spawn(async move { controller.send(&text).await }));
                }
            }
            Command::Retry => {
                if busy {
                    say(&out, "Still replying. Use /stop to cancel.");
                } else if controller.messages().is_empty() {
                    say(&out, "Nothing to retry.");
                } else {
                    let controller = controller.clone();
                    inflight = Some(tokio::spawn(async move { controller.retry().await }));
                }
            }
            Command::Stop => {
                if !controller.stop() {
                    say(&out, "Nothing to stop.");
                }
            }
            Command::Clear => {
                controller.clear_all();
                say(&out, "Started a new chat.");
            }
            Command::Webhook(url) => {
                controller.set_webhook_url(&url);
                let webhook = controller.webhook();
                if webhook.is_connected() {
                    say(&out, &format!("Webhook set to {}. Started a new chat.", webhook.url()));
                } else {
                    say(&out, "Webhook cleared. Using demo mode.");
                }
            }
            Command::Test(url) => {
                let url = url.unwrap_or_else(|| controller.webhook().url().to_string());
                if url.is_empty() {
                    say(&out, "No webhook configured. Use /test <url> or /webhook <url>.");
                } else {
                    let http = controller.http().clone();
                    let out = out.clone();
                    tokio::spawn(async move {
                        match test_connection(&http, &url).await {
                            Ok(()) => say(&out, "Connection successful."),
                            Err(e) => say(&out, &format!("Connection failed: {e}")),
                        }
                    });
                }
            }
            Command::Stream => {
                let on = controller.toggle_streaming();
                say(&out, if on { "Streaming on." } else { "Streaming off." });
            }
            Command::Status => say(&out, &format_status(&controller.snapshot())),
            Command::History => {
                let messages = controller.messages();
                if messages.is_empty() {
                    say(&out, "No messages yet.");
                }
                for message in &messages {
                    say(&out, &format_message(message));
                }
            }
            Command::Help => say(&out, HELP),
            Command::Quit => {
                quit = true;
                break;
            }
            Command::Unknown(name) => say(&out, &format!("Unknown command /{name}. Type /help for commands.")),
        }
    }

    if quit {
        controller.stop();
    } else if let Some(task) = inflight.take() {
        let _ = task.await;
    }
    controller.wait_idle().await;

    let _ = shutdown_tx.send(());
    let _ = render_task.await;
    Ok(())
}

fn spawn_renderer(controller: &ChatController, out: Output, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
    let mut rx = controller.subscribe();
    let mut renderer = TranscriptRenderer::resume(&rx.borrow_and_update());
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    emit(&mut renderer, &mut rx, &out);
                }
                _ = &mut shutdown => {
                    emit(&mut renderer, &mut rx, &out);
                    break;
                }
            }
        }
    })
}

fn emit(renderer: &mut TranscriptRenderer, rx: &mut watch::Receiver<ChatSnapshot>, out: &Output) {
    let text = renderer.render(&rx.borrow_and_update());
    if !text.is_empty() {
        let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

fn say(out: &Output, text: &str) {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}
