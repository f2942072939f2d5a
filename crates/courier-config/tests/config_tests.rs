// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use std::io::Write;

use courier_config::diagnostic::ConfigError;
use courier_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[platform]
client_id = "1234"
client_secret = "app-secret"
redirect_uri = "https://example.com/auth/callback"
oauth_base_url = "http://localhost:9000"
api_base_url = "http://localhost:9001"
request_timeout_secs = 5

[webhook]
verify_token = "hub-token"
store_retry_attempts = 5

[refresh]
enabled = false
lookahead_fraction = 0.25
max_consecutive_failures = 3

[dispatch]
max_attempts = 2
platform_idempotency = true

[exchange]
retry_backoff_ms = 10

[storage]
database_path = "/tmp/courier-test.db"
wal_mode = false

[server]
host = "0.0.0.0"
port = 8080
bearer_token = "ops"

[logging]
level = "debug"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.platform.client_id.as_deref(), Some("1234"));
    assert_eq!(config.platform.api_base_url, "http://localhost:9001");
    assert_eq!(config.platform.request_timeout_secs, 5);
    assert_eq!(config.webhook.verify_token.as_deref(), Some("hub-token"));
    assert_eq!(config.webhook_app_secret(), Some("app-secret"));
    assert_eq!(config.webhook.store_retry_attempts, 5);
    assert!(!config.refresh.enabled);
    assert_eq!(config.refresh.lookahead_fraction, 0.25);
    assert_eq!(config.refresh.max_consecutive_failures, 3);
    assert_eq!(config.refresh.poll_interval_secs, 300);
    assert_eq!(config.dispatch.max_attempts, 2);
    assert!(config.dispatch.platform_idempotency);
    assert_eq!(config.exchange.retry_backoff_ms, 10);
    assert_eq!(config.storage.database_path, "/tmp/courier-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bearer_token.as_deref(), Some("ops"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.dispatch.max_attempts, 4);
    assert_eq!(config.refresh.initial_backoff_secs, 30);
    assert!(config.storage.wal_mode);
    assert!(config.platform.client_id.is_none());
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[webhook]
verfy_token = "x"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(!errors.is_empty());
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "verfy_token");
            assert_eq!(suggestion.as_deref(), Some("verify_token"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

#[test]
fn semantic_errors_surface_after_parse() {
    let toml = r#"
[refresh]
lookahead_fraction = 0.0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("lookahead_fraction"))
    ));
}

#[test]
fn loads_from_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 4040").unwrap();
    let config = load_and_validate_path(file.path()).expect("file config loads");
    assert_eq!(config.server.port, 4040);
}
