// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the semantic constraints serde cannot express. All problems are
//! collected; validation does not stop at the first one.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for (name, url) in [
        ("platform.oauth_base_url", &config.platform.oauth_base_url),
        ("platform.api_base_url", &config.platform.api_base_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ConfigError::validation(format!(
                "{name} must be an http(s) URL, got `{url}`"
            )));
        }
    }

    if config.platform.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "platform.request_timeout_secs must be at least 1",
        ));
    }

    if config.webhook.store_retry_attempts == 0 {
        errors.push(ConfigError::validation(
            "webhook.store_retry_attempts must be at least 1",
        ));
    }

    let refresh = &config.refresh;
    if !(refresh.lookahead_fraction > 0.0 && refresh.lookahead_fraction < 1.0) {
        errors.push(ConfigError::validation(format!(
            "refresh.lookahead_fraction must be between 0 and 1 (exclusive), got {}",
            refresh.lookahead_fraction
        )));
    }
    if refresh.poll_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "refresh.poll_interval_secs must be at least 1",
        ));
    }
    if refresh.initial_backoff_secs == 0 || refresh.initial_backoff_secs > refresh.max_backoff_secs
    {
        errors.push(ConfigError::validation(format!(
            "refresh.initial_backoff_secs ({}) must be non-zero and not exceed refresh.max_backoff_secs ({})",
            refresh.initial_backoff_secs, refresh.max_backoff_secs
        )));
    }
    if refresh.max_consecutive_failures == 0 {
        errors.push(ConfigError::validation(
            "refresh.max_consecutive_failures must be at least 1",
        ));
    }
    if refresh.max_concurrent_renewals == 0 {
        errors.push(ConfigError::validation(
            "refresh.max_concurrent_renewals must be at least 1",
        ));
    }

    let dispatch = &config.dispatch;
    if dispatch.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "dispatch.max_attempts must be at least 1",
        ));
    }
    if dispatch.initial_backoff_ms > dispatch.max_backoff_ms {
        errors.push(ConfigError::validation(format!(
            "dispatch.initial_backoff_ms ({}) must not exceed dispatch.max_backoff_ms ({})",
            dispatch.initial_backoff_ms, dispatch.max_backoff_ms
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }
    if let Some(key) = &config.storage.token_encryption_key {
        let valid = hex::decode(key.trim())
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false);
        if !valid {
            errors.push(ConfigError::validation(
                "storage.token_encryption_key must be 64 hex characters (32 bytes)",
            ));
        }
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.logging.level
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
