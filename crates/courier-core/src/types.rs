// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the credential lifecycle and messaging pipeline.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter registered with the runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Platform,
    Observability,
}

/// Kind of access token issued by the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Freshly issued, minutes to hours. Never persisted.
    ShortLived,
    /// Upgraded token, valid for weeks.
    LongLived,
}

/// Renewal state of a persisted credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Fresh,
    RefreshPending,
    /// Standing condition until a fresh exchange replaces the credential.
    RefreshFailed,
}

/// State of an outbound dispatch in the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Sent,
    Failed,
}

impl DispatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Sent | DispatchState::Failed)
    }
}

/// An access credential for one platform subject.
///
/// At most one credential exists per `subject_id`. Only
/// [`TokenKind::LongLived`] credentials are ever persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    pub access_token: String,
    pub token_kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_state: RefreshState,
    /// Consecutive failed renewals since the last success.
    pub refresh_attempts: u32,
    /// Earliest time the scheduler may attempt the next renewal (backoff).
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Credential {
    /// Builds a fresh long-lived credential issued at `issued_at`.
    pub fn long_lived(
        subject_id: impl Into<String>,
        access_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            access_token: access_token.into(),
            token_kind: TokenKind::LongLived,
            issued_at,
            expires_at: issued_at + expires_in,
            refresh_state: RefreshState::Fresh,
            refresh_attempts: 0,
            next_refresh_at: None,
            last_error: None,
        }
    }

    /// Total lifetime the platform granted for the current token.
    pub fn granted_lifetime(&self) -> Duration {
        self.expires_at - self.issued_at
    }

    /// Time left before expiry; negative once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whether the credential may authorize an outbound call at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.token_kind == TokenKind::LongLived
            && self.refresh_state != RefreshState::RefreshFailed
            && self.expires_at > now
    }

    /// Whether the remaining lifetime has dropped below `fraction` of the
    /// granted lifetime.
    pub fn within_lookahead(&self, now: DateTime<Utc>, fraction: f64) -> bool {
        let granted_ms = self.granted_lifetime().num_milliseconds().max(0) as f64;
        let threshold = Duration::milliseconds((granted_ms * fraction) as i64);
        self.remaining_lifetime(now) < threshold
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("access_token", &"[redacted]")
            .field("token_kind", &self.token_kind)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("refresh_state", &self.refresh_state)
            .field("refresh_attempts", &self.refresh_attempts)
            .field("next_refresh_at", &self.next_refresh_at)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// A message event pushed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessageEvent {
    /// Idempotency key assigned by the platform. Redeliveries reuse it.
    pub platform_event_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: Vec<u8>,
    pub received_at: DateTime<Utc>,
    /// Platform-side timestamp in milliseconds, when provided.
    pub platform_timestamp: Option<i64>,
}

impl InboundMessageEvent {
    /// Body as UTF-8 text, lossily decoded.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A persisted event with its log position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub sequence: i64,
    pub event: InboundMessageEvent,
}

/// Result of appending to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// An event with the same id was already persisted.
    Duplicate,
}

/// Counts produced by one webhook ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub persisted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub store_failures: usize,
}

impl IngestReport {
    /// Whether the whole payload may be acknowledged to the platform.
    pub fn acknowledged(&self) -> bool {
        self.store_failures == 0
    }
}

/// A caller's request to send one message on behalf of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessageRequest {
    pub idempotency_key: String,
    /// The sending subject whose credential authorizes the call.
    pub subject_id: String,
    pub recipient_id: String,
    pub body: String,
}

impl OutboundMessageRequest {
    /// Builds a request with a random idempotency key.
    pub fn new(
        subject_id: impl Into<String>,
        recipient_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            idempotency_key: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            recipient_id: recipient_id.into(),
            body: body.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }
}

/// The persisted `idempotency_key -> dispatch_state` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub idempotency_key: String,
    pub subject_id: String,
    pub recipient_id: String,
    pub body: String,
    pub state: DispatchState,
    /// Number of sends started for this key, across restarts.
    pub attempts: u32,
    pub platform_message_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a caller of `dispatch` gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub idempotency_key: String,
    pub state: DispatchState,
    pub attempts: u32,
    pub platform_message_id: Option<String>,
    pub error: Option<String>,
}

impl From<&DispatchRecord> for DispatchOutcome {
    fn from(record: &DispatchRecord) -> Self {
        Self {
            idempotency_key: record.idempotency_key.clone(),
            state: record.state,
            attempts: record.attempts,
            platform_message_id: record.platform_message_id.clone(),
            error: record.last_error.clone(),
        }
    }
}

/// Token returned by the code exchange step.
#[derive(Clone, PartialEq, Eq)]
pub struct ShortLivedGrant {
    pub access_token: String,
    pub subject_id: String,
    pub expires_in: Option<Duration>,
}

impl fmt::Debug for ShortLivedGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortLivedGrant")
            .field("access_token", &"[redacted]")
            .field("subject_id", &self.subject_id)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token returned by the upgrade and refresh endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct LongLivedGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for LongLivedGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongLivedGrant")
            .field("access_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Platform acknowledgement of an outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub platform_message_id: Option<String>,
}
