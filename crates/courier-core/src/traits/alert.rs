// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::types::Credential;

/// Receives standing conditions that need an operator or a fresh exchange.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Called once when a credential enters `RefreshFailed`.
    async fn credential_lapsed(&self, credential: &Credential, reason: &str);
}
