//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::streaming::Pacing;

pub const DEFAULT_THINK_TIME_MS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHUNK_MIN: usize = 2;
pub const DEFAULT_CHUNK_MAX: usize = 4;
pub const DEFAULT_TICK_MIN_MS: u64 = 20;
pub const DEFAULT_TICK_MAX_MS: u64 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the durable store file.
    pub data_dir: PathBuf,
    /// Delay before the demo responder answers.
    pub think_time: Duration,
    pub timeouts: HttpTimeouts,
    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            think_time: Duration::from_millis(DEFAULT_THINK_TIME_MS),
            timeouts: HttpTimeouts::default(),
            pacing: Pacing::default(),
        }
    }
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `VOLTCHAT_DATA_DIR`: default `$HOME/.local/share/voltchat`
    /// - `VOLTCHAT_THINK_TIME_MS`: default 300
    /// - `VOLTCHAT_REQUEST_TIMEOUT_SECS`: default 120
    /// - `VOLTCHAT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `VOLTCHAT_CHUNK_MIN` / `VOLTCHAT_CHUNK_MAX`: default 2 / 4
    /// - `VOLTCHAT_TICK_MIN_MS` / `VOLTCHAT_TICK_MAX_MS`: default 20 / 35
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let data_dir = std::env::var("VOLTCHAT_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(default_data_dir, PathBuf::from);
        let think_time = Duration::from_millis(env_parse("VOLTCHAT_THINK_TIME_MS", DEFAULT_THINK_TIME_MS));
        let timeouts = HttpTimeouts {
            request_secs: env_parse("VOLTCHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("VOLTCHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let pacing = Pacing {
            chunk_min: env_parse("VOLTCHAT_CHUNK_MIN", DEFAULT_CHUNK_MIN),
            chunk_max: env_parse("VOLTCHAT_CHUNK_MAX", DEFAULT_CHUNK_MAX),
            tick_min: Duration::from_millis(env_parse("VOLTCHAT_TICK_MIN_MS", DEFAULT_TICK_MIN_MS)),
            tick_max: Duration::from_millis(env_parse("VOLTCHAT_TICK_MAX_MS", DEFAULT_TICK_MAX_MS)),
        }
        .normalized();

        Self { data_dir, think_time, timeouts, pacing }
    }
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".local").join("share").join("voltchat")
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
