// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tracing::error;

use courier_core::{AlertSink, Credential};

/// Default alert sink: one structured error event per lapsed credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn credential_lapsed(&self, credential: &Credential, reason: &str) {
        error!(
            subject_id = %credential.subject_id,
            attempts = credential.refresh_attempts,
            expires_at = %credential.expires_at,
            reason,
            "credential refresh exhausted; a fresh authorization is required"
        );
    }
}
