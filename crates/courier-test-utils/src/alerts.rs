// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{AlertSink, Credential};

/// Alert sink that records `(subject_id, reason)` pairs.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.alerts.lock().await.len()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn credential_lapsed(&self, credential: &Credential, reason: &str) {
        self.alerts
            .lock()
            .await
            .push((credential.subject_id.clone(), reason.to_string()));
    }
}
