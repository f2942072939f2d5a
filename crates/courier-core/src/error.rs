// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by every Courier component.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Stable, serializable name for each class of failure.
///
/// Used in logs, metrics labels, HTTP error bodies, and persisted dispatch
/// records. [`CourierError::kind`] maps every error onto one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCode,
    UpstreamUnavailable,
    UpgradeFailed,
    Unauthenticated,
    MalformedPayload,
    StoreUnavailable,
    NoCredential,
    RefreshExhausted,
    Rejected,
    Config,
    Internal,
}

/// The primary error type used across all Courier traits and operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// The platform rejected or expired the authorization code. Never retried.
    #[error("authorization code rejected: {message}")]
    InvalidCode { message: String },

    /// Network failure, timeout, 429 or 5xx from the platform.
    ///
    /// `ambiguous` is true when the request may have reached the platform
    /// (e.g. a timeout after the body was sent), so a retry could repeat a
    /// non-idempotent effect.
    #[error("platform unavailable: {message}")]
    UpstreamUnavailable { message: String, ambiguous: bool },

    /// A short-lived token was obtained but could not be upgraded.
    #[error("token upgrade failed: {message}")]
    UpgradeFailed { message: String },

    /// Webhook signature mismatch or bad verify token.
    #[error("request not authenticated: {0}")]
    Unauthenticated(String),

    /// The payload as a whole could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The credential store, event log, or dispatch ledger could not be reached.
    #[error("store unavailable: {source}")]
    StoreUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No usable credential exists for the subject.
    #[error("no usable credential for subject {subject_id}")]
    NoCredential { subject_id: String },

    /// Renewal failed too many times in a row; a fresh exchange is required.
    #[error("refresh exhausted for subject {subject_id} after {attempts} attempts")]
    RefreshExhausted { subject_id: String, attempts: u32 },

    /// Non-retryable rejection from the platform (blocked recipient, revoked token).
    #[error("platform rejected request: {message}")]
    Rejected { message: String },

    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any storage-layer error.
    pub fn store(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CourierError::StoreUnavailable {
            source: source.into(),
        }
    }

    /// Unambiguous upstream failure: the platform definitely did not act on the request.
    pub fn upstream(message: impl Into<String>) -> Self {
        CourierError::UpstreamUnavailable {
            message: message.into(),
            ambiguous: false,
        }
    }

    /// Returns the taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CourierError::InvalidCode { .. } => ErrorKind::InvalidCode,
            CourierError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            CourierError::UpgradeFailed { .. } => ErrorKind::UpgradeFailed,
            CourierError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            CourierError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            CourierError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            CourierError::NoCredential { .. } => ErrorKind::NoCredential,
            CourierError::RefreshExhausted { .. } => ErrorKind::RefreshExhausted,
            CourierError::Rejected { .. } => ErrorKind::Rejected,
            CourierError::Config(_) => ErrorKind::Config,
            CourierError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the owning component may retry this error locally with backoff.
    ///
    /// Only upstream and store unavailability are transient. Everything else
    /// propagates to the caller unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CourierError::UpstreamUnavailable { .. } | CourierError::StoreUnavailable { .. }
        )
    }

    /// True for an upstream failure where the request may have been delivered.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            CourierError::UpstreamUnavailable {
                ambiguous: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            CourierError::InvalidCode {
                message: "expired".into()
            }
            .kind(),
            ErrorKind::InvalidCode
        );
        assert_eq!(
            CourierError::store(std::io::Error::other("disk")).kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            CourierError::NoCredential {
                subject_id: "u1".into()
            }
            .kind(),
            ErrorKind::NoCredential
        );
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            ErrorKind::UpstreamUnavailable,
            ErrorKind::StoreUnavailable,
            ErrorKind::RefreshExhausted,
        ] {
            assert_eq!(kind.to_string().parse::<ErrorKind>().unwrap(), kind);
        }
        // Local timeouts surface as upstream_unavailable.
        assert!("timeout".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn only_upstream_and_store_are_transient() {
        assert!(CourierError::upstream("502").is_transient());
        assert!(CourierError::store(std::io::Error::other("locked")).is_transient());
        assert!(!CourierError::InvalidCode {
            message: "x".into()
        }
        .is_transient());
        assert!(!CourierError::Rejected {
            message: "blocked".into()
        }
        .is_transient());
        assert!(!CourierError::RefreshExhausted {
            subject_id: "u1".into(),
            attempts: 5
        }
        .is_transient());
    }

    #[test]
    fn ambiguity_only_on_flagged_upstream_errors() {
        let timeout = CourierError::UpstreamUnavailable {
            message: "timed out".into(),
            ambiguous: true,
        };
        assert!(timeout.is_ambiguous());
        assert!(!CourierError::upstream("connect refused").is_ambiguous());
    }

    #[test]
    fn error_kind_string_forms_are_snake_case() {
        assert_eq!(ErrorKind::NoCredential.to_string(), "no_credential");
        assert_eq!(
            ErrorKind::from_str("upstream_unavailable").unwrap(),
            ErrorKind::UpstreamUnavailable
        );
        let json = serde_json::to_string(&ErrorKind::RefreshExhausted).unwrap();
        assert_eq!(json, "\"refresh_exhausted\"");
    }
}
