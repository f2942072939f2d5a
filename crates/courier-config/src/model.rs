// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Courier.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// All sections are optional and default to sensible values. Secrets default
/// to `None` and are usually supplied through `COURIER_*` env vars.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Platform application credentials and endpoints.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Webhook verification and ingestion settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Background credential refresh settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Outbound dispatch retry settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Authorization code exchange settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Platform application configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// OAuth client identifier.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Redirect target registered with the platform.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Base URL for the authorization code endpoint.
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,

    /// Base URL for token upgrade, refresh, and message endpoints.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout applied to every outbound platform call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            oauth_base_url: default_oauth_base_url(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("oauth_base_url", &self.oauth_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_oauth_base_url() -> String {
    "https://api.instagram.com".to_string()
}

fn default_api_base_url() -> String {
    "https://graph.instagram.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Webhook verification configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Shared token echoed back during the subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// HMAC key for `X-Hub-Signature-256`. Falls back to `platform.client_secret`.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// Store write attempts per event before the payload is left unacked.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,

    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            app_secret: None,
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_backoff_ms: default_store_retry_backoff_ms(),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field(
                "verify_token",
                &self.verify_token.as_ref().map(|_| "[redacted]"),
            )
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .field("store_retry_attempts", &self.store_retry_attempts)
            .field("store_retry_backoff_ms", &self.store_retry_backoff_ms)
            .finish()
    }
}

fn default_store_retry_attempts() -> u32 {
    3
}

fn default_store_retry_backoff_ms() -> u64 {
    100
}

/// Token refresh scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Run the background scheduler in `serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scans of the credential store.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Renew once remaining lifetime drops below this fraction of the granted lifetime.
    #[serde(default = "default_lookahead_fraction")]
    pub lookahead_fraction: f64,

    /// How far ahead each scan asks the store for expiring credentials.
    #[serde(default = "default_scan_window_secs")]
    pub scan_window_secs: u64,

    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Consecutive failures before a credential is marked `refresh_failed`.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_max_concurrent_renewals")]
    pub max_concurrent_renewals: usize,

    /// Bound on waiting for in-flight renewals at shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            poll_interval_secs: default_poll_interval_secs(),
            lookahead_fraction: default_lookahead_fraction(),
            scan_window_secs: default_scan_window_secs(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
            max_concurrent_renewals: default_max_concurrent_renewals(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_lookahead_fraction() -> f64 {
    0.2
}

fn default_scan_window_secs() -> u64 {
    60 * 24 * 60 * 60
}

fn default_initial_backoff_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    3600
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_max_concurrent_renewals() -> usize {
    8
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Message dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Total send attempts per idempotency key, first send included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_dispatch_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_dispatch_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Whether the platform deduplicates sends by `Idempotency-Key`.
    /// When false, a record left mid-send by a crash is failed instead of resent.
    #[serde(default)]
    pub platform_idempotency: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_dispatch_initial_backoff_ms(),
            max_backoff_ms: default_dispatch_max_backoff_ms(),
            platform_idempotency: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_dispatch_initial_backoff_ms() -> u64 {
    500
}

fn default_dispatch_max_backoff_ms() -> u64 {
    30_000
}

/// Token exchange configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    /// Delay before the single retry of a provably unconsumed code.
    #[serde(default = "default_exchange_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_exchange_retry_backoff_ms(),
        }
    }
}

fn default_exchange_retry_backoff_ms() -> u64 {
    1000
}

/// Storage backend configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Hex-encoded 32-byte AES-256-GCM key sealing access tokens at rest.
    #[serde(default)]
    pub token_encryption_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_true(),
            token_encryption_key: None,
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("database_path", &self.database_path)
            .field("wal_mode", &self.wal_mode)
            .field(
                "token_encryption_key",
                &self.token_encryption_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for `/v1` routes. When unset, those routes reject everything.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CourierConfig {
    /// Key used to authenticate webhook deliveries.
    pub fn webhook_app_secret(&self) -> Option<&str> {
        self.webhook
            .app_secret
            .as_deref()
            .or(self.platform.client_secret.as_deref())
    }
}
