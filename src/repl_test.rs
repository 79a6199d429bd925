use std::time::{Duration, Instant};

use axum::http::StatusCode;

use super::*;
use crate::config::Config;
use crate::message::{MessageStatus, Role};
use crate::render::REPLY_PREFIX;
use crate::responder::demo::{GREETING, WEBHOOK_HINT};
use crate::store::ChatStorage;
use crate::test_helpers::{fake_webhook_with_delay, fast_config};

fn controller() -> ChatController {
    ChatController::new(ChatStorage::in_memory(), &fast_config()).expect("controller")
}

/// Demo replies wait long enough for the pending placeholder to be observed.
fn thinking_controller() -> ChatController {
    let config = Config { think_time: Duration::from_millis(20), ..fast_config() };
    ChatController::new(ChatStorage::in_memory(), &config).expect("controller")
}

fn capture() -> (Output, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let out: Output = buf.clone();
    (out, buf)
}

fn printed(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buf.lock().expect("output buffer").clone()).expect("utf-8 output")
}

// =============================================================
// parse_command
// =============================================================

#[test]
fn plain_text_is_a_message() {
    assert_eq!(parse_command("  hello there \n"), Command::Send("hello there".into()));
    assert_eq!(parse_command("   "), Command::Empty);
}

#[test]
fn slash_commands() {
    assert_eq!(parse_command("/retry"), Command::Retry);
    assert_eq!(parse_command("/stop"), Command::Stop);
    assert_eq!(parse_command("/clear"), Command::Clear);
    assert_eq!(parse_command("/stream"), Command::Stream);
    assert_eq!(parse_command("/status"), Command::Status);
    assert_eq!(parse_command("/history"), Command::History);
    assert_eq!(parse_command("/help"), Command::Help);
    assert_eq!(parse_command("/QUIT"), Command::Quit);
}

#[test]
fn webhook_takes_optional_url() {
    assert_eq!(parse_command("/webhook  https://hook.test/x "), Command::Webhook("https://hook.test/x".into()));
    assert_eq!(parse_command("/webhook"), Command::Webhook(String::new()));
}

#[test]
fn test_takes_optional_url() {
    assert_eq!(parse_command("/test"), Command::Test(None));
    assert_eq!(parse_command("/test http://a.test"), Command::Test(Some("http://a.test".into())));
}

#[test]
fn unknown_command_keeps_name() {
    assert_eq!(parse_command("/frobnicate now"), Command::Unknown("frobnicate".into()));
}

// =============================================================
// run
// =============================================================

#[tokio::test]
async fn piped_message_waits_for_reply() {
    let chat = controller();
    run(&chat, &b"hello\n"[..]).await.expect("run");

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, GREETING);
    assert_eq!(messages[1].status, MessageStatus::Complete);
    assert!(!chat.is_loading());
}

#[tokio::test]
async fn second_line_while_busy_is_not_sent() {
    let chat = controller();
    run(&chat, &b"hello\nsecond\n"[..]).await.expect("run");

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello");
}

#[tokio::test]
async fn settings_commands_apply_and_quit_stops_reading() {
    let chat = controller();
    run(&chat, &b"/stream\n/webhook http://127.0.0.1:9/hook\n/quit\nhello\n"[..])
        .await
        .expect("run");

    assert!(!chat.streaming_enabled());
    assert!(chat.webhook().is_connected());
    assert!(chat.messages().is_empty());
}

#[tokio::test]
async fn clear_after_reply_empties_history() {
    let chat = controller();
    run(&chat, &b"hello\n"[..]).await.expect("run");
    let session = chat.session_id();

    run(&chat, &b"/clear\n"[..]).await.expect("run");
    assert!(chat.messages().is_empty());
    assert_ne!(chat.session_id(), session);
}

#[tokio::test]
async fn streamed_reply_is_printed() {
    let chat = thinking_controller();
    let (out, buf) = capture();
    run_with_output(&chat, &b"hello\n"[..], out).await.expect("run");

    assert!(printed(&buf).contains(&format!("{REPLY_PREFIX}{GREETING}\n")));
}

#[tokio::test]
async fn reply_is_printed_with_streaming_off() {
    let chat = thinking_controller();
    let (out, buf) = capture();
    run_with_output(&chat, &b"/stream\nhello\n"[..], out).await.expect("run");

    let text = printed(&buf);
    assert!(text.contains("Streaming off."));
    assert!(text.contains(&format!("{REPLY_PREFIX}{GREETING}\n")), "output was {text:?}");
    assert!(!text.contains(&format!("{REPLY_PREFIX}\n")));
}

#[tokio::test]
async fn renderer_follows_published_non_streaming_sequence() {
    let chat = thinking_controller();
    chat.toggle_streaming();

    let mut rx = chat.subscribe();
    let mut renderer = TranscriptRenderer::resume(&rx.borrow_and_update());
    let collector = tokio::spawn(async move {
        let mut text = String::new();
        let mut saw_pending = false;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            saw_pending |= snapshot.loading
                && snapshot
                    .messages
                    .last()
                    .is_some_and(|m| m.content.is_empty() && m.status == MessageStatus::Complete);
            text.push_str(&renderer.render(&snapshot));
            if !snapshot.loading && snapshot.messages.len() == 2 {
                break;
            }
        }
        (text, saw_pending)
    });

    assert_eq!(chat.send("how do I set a webhook?").await, SendOutcome::Completed);
    let (text, saw_pending) = collector.await.expect("collector");
    assert!(saw_pending);
    assert_eq!(text, format!("{REPLY_PREFIX}{WEBHOOK_HINT}\n"));
}

#[tokio::test]
async fn connection_test_does_not_block_input() {
    let (url, seen) = fake_webhook_with_delay(StatusCode::OK, "{}", Duration::from_millis(500)).await;
    let chat = controller();
    let (out, buf) = capture();
    let input = format!("/test {url}\n/status\n");

    let started = Instant::now();
    run_with_output(&chat, input.as_bytes(), out).await.expect("run");
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(printed(&buf).contains("mode: demo"));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !printed(&buf).contains("Connection successful.") {
        assert!(Instant::now() < deadline, "connection test never reported");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(seen.lock().expect("seen").len(), 1);
}
