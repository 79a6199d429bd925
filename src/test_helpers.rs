//! Shared fixtures for unit tests: a throwaway webhook server and a fast
//! controller config.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::Value;

use crate::config::Config;
use crate::streaming::Pacing;

/// Requests seen by a fake webhook, in arrival order.
pub type Seen = Arc<Mutex<Vec<Value>>>;

/// Controller config with no think time and near-instant ticks.
pub fn fast_config() -> Config {
    Config {
        think_time: Duration::ZERO,
        pacing: Pacing {
            chunk_min: 2,
            chunk_max: 4,
            tick_min: Duration::from_millis(1),
            tick_max: Duration::from_millis(2),
        },
        ..Config::default()
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Fake webhook at `/hook` answering every POST with `status` and `body`,
/// recording each JSON request body.
pub async fn fake_webhook(status: StatusCode, body: &'static str) -> (String, Seen) {
    fake_webhook_with_delay(status, body, Duration::ZERO).await
}

/// Like `fake_webhook`, but waits `delay` before answering.
pub async fn fake_webhook_with_delay(status: StatusCode, body: &'static str, delay: Duration) -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/hook",
            post(move |State(seen): State<Seen>, raw: String| async move {
                if let Ok(json) = serde_json::from_str::<Value>(&raw) {
                    seen.lock().expect("seen mutex").push(json);
                }
                tokio::time::sleep(delay).await;
                (status, body)
            }),
        )
        .with_state(seen.clone());
    let base = serve(router).await;
    (format!("{base}/hook"), seen)
}

/// A local URL nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind spare listener");
    let addr = listener.local_addr().expect("spare listener addr");
    drop(listener);
    format!("http://{addr}/hook")
}
