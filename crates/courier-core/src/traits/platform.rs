// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Egress interface to the social-messaging platform.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{LongLivedGrant, OutboundMessageRequest, SendReceipt, ShortLivedGrant};

/// Calls the platform's OAuth, refresh, and send endpoints.
///
/// Implementations must bound every call with a timeout and classify
/// failures into the error taxonomy: timeouts are ambiguous
/// `UpstreamUnavailable`, connection failures, 429 and 5xx are plain
/// `UpstreamUnavailable`.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Trades a one-time authorization code for a short-lived token.
    ///
    /// A rejected or already-used code is `InvalidCode`.
    async fn exchange_code(&self, code: &str) -> Result<ShortLivedGrant, CourierError>;

    /// Upgrades a short-lived token to a long-lived one.
    async fn upgrade(&self, short_lived_token: &str) -> Result<LongLivedGrant, CourierError>;

    /// Renews a long-lived token before it expires.
    async fn refresh(&self, long_lived_token: &str) -> Result<LongLivedGrant, CourierError>;

    /// Sends one message, authorized by `access_token`.
    ///
    /// `Rejected` means the platform refused the message and it must not be
    /// retried.
    async fn send_message(
        &self,
        access_token: &str,
        request: &OutboundMessageRequest,
    ) -> Result<SendReceipt, CourierError>;
}
