// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Config;

#[test]
fn defaults_validate() {
    let config = Config::new("http://127.0.0.1:4000");
    assert!(config.validate().is_ok());
}

#[yare::parameterized(
    bad_scheme = { "ftp://x" },
    bare_host = { "localhost:4000" },
)]
fn rejects_non_http_api_url(api_url: &str) {
    let config = Config::new(api_url);
    assert!(config.validate().is_err());
}

#[test]
fn rejects_unknown_log_format() {
    let mut config = Config::new("http://x");
    config.log_format = "yaml".to_owned();
    assert!(config.validate().is_err());
}

#[test]
fn ws_endpoint_derived_from_api_url() {
    let config = Config::new("http://api.example.com/");
    assert_eq!(config.ws_endpoint(), "ws://api.example.com/ws");

    let config = Config::new("https://api.example.com");
    assert_eq!(config.ws_endpoint(), "wss://api.example.com/ws");
}

#[test]
fn explicit_ws_url_wins() {
    let mut config = Config::new("https://api.example.com");
    config.ws_url = Some("wss://rt.example.com/socket".to_owned());
    assert_eq!(config.ws_endpoint(), "wss://rt.example.com/socket");
}

#[test]
fn timeout_helpers() {
    let mut config = Config::new("http://x");
    config.http_timeout_ms = 1500;
    config.recovery_cooldown_ms = 250;
    assert_eq!(config.http_timeout().as_millis(), 1500);
    assert_eq!(config.recovery_cooldown().as_millis(), 250);
}
