// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the medilink client.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Backend base URL.
    #[arg(long, default_value = "http://127.0.0.1:4000", env = "MEDILINK_API_URL")]
    pub api_url: String,

    /// Real-time WebSocket URL. Derived from the API URL when unset.
    #[arg(long, env = "MEDILINK_WS_URL")]
    pub ws_url: Option<String>,

    /// Directory for durable client state (session record, durable cache).
    #[arg(long, env = "MEDILINK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// HTTP request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "MEDILINK_HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: u64,

    /// Cooldown for deduplicating session-expiry recovery, in milliseconds.
    #[arg(long, default_value_t = 5_000, env = "MEDILINK_RECOVERY_COOLDOWN_MS")]
    pub recovery_cooldown_ms: u64,

    /// Log level filter (e.g. "info", "medilink=debug").
    #[arg(long, default_value = "info", env = "MEDILINK_LOG")]
    pub log_level: String,

    /// Log format: text or json.
    #[arg(long, default_value = "text", env = "MEDILINK_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Config with defaults for embedding the SDK without a CLI.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: None,
            state_dir: None,
            http_timeout_ms: 10_000,
            recovery_cooldown_ms: 5_000,
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(format!("api-url must be http(s), got: {}", self.api_url));
        }
        if let Some(ref ws) = self.ws_url {
            if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
                return Err(format!("ws-url must be ws(s), got: {ws}"));
            }
        }
        if self.http_timeout_ms == 0 {
            return Err("http-timeout-ms must be positive".to_owned());
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(format!("log-format must be text or json, got: {}", self.log_format));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn recovery_cooldown(&self) -> Duration {
        Duration::from_millis(self.recovery_cooldown_ms)
    }

    /// WebSocket endpoint: the explicit `ws_url`, or the API URL with the
    /// scheme swapped and `/ws` appended.
    pub fn ws_endpoint(&self) -> String {
        if let Some(ref ws) = self.ws_url {
            return ws.clone();
        }
        let base = self.api_url.trim_end_matches('/');
        let ws_base = if base.starts_with("https://") {
            base.replacen("https://", "wss://", 1)
        } else {
            base.replacen("http://", "ws://", 1)
        };
        format!("{ws_base}/ws")
    }

    /// State directory: explicit flag, else `$HOME/.medilink`, else a
    /// `medilink` dir under the system temp dir.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".medilink"),
            None => std::env::temp_dir().join("medilink"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
