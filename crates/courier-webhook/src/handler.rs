// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use courier_config::model::WebhookConfig;
use courier_core::{
    AppendOutcome, Backoff, CourierError, EventLog, InboundMessageEvent, IngestReport,
};

use crate::handshake::HandshakeParams;
use crate::payload::parse_payload;
use crate::signature::SignatureVerifier;

const BROADCAST_CAPACITY: usize = 256;

/// Authenticates, parses and persists webhook deliveries.
///
/// Holds no per-request state; every call stands alone against the
/// [`EventLog`].
pub struct IngestionHandler {
    verifier: Option<SignatureVerifier>,
    verify_token: Option<String>,
    log: Arc<dyn EventLog>,
    store_attempts: u32,
    store_backoff: Backoff,
    events_tx: broadcast::Sender<InboundMessageEvent>,
}

impl IngestionHandler {
    /// Without an `app_secret` every delivery is rejected.
    pub fn new(log: Arc<dyn EventLog>, config: &WebhookConfig, app_secret: Option<&str>) -> Self {
        let verifier = app_secret
            .filter(|s| !s.is_empty())
            .map(SignatureVerifier::new);
        if verifier.is_none() {
            warn!("no webhook app secret configured; all deliveries will be rejected");
        }
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let backoff_ms = config.store_retry_backoff_ms;
        Self {
            verifier,
            verify_token: config.verify_token.clone(),
            log,
            store_attempts: config.store_retry_attempts.max(1),
            store_backoff: Backoff::new(
                Duration::from_millis(backoff_ms),
                Duration::from_millis(backoff_ms.saturating_mul(8)),
            ),
            events_tx,
        }
    }

    /// Newly persisted events, in ingestion order. Duplicates are not resent.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessageEvent> {
        self.events_tx.subscribe()
    }

    /// Answers the subscription handshake.
    pub fn handshake(&self, params: &HandshakeParams) -> Result<String, CourierError> {
        let result = params.verify(self.verify_token.as_deref());
        match &result {
            Ok(_) => info!("webhook subscription verified"),
            Err(e) => warn!(error = %e, "webhook handshake rejected"),
        }
        result
    }

    /// Ingests one delivery.
    ///
    /// `Ok` means the delivery may be acknowledged. `StoreUnavailable` means
    /// at least one event could not be persisted and the platform should
    /// redeliver; events that were persisted deduplicate on redelivery.
    #[instrument(skip_all, fields(bytes = body.len()))]
    pub async fn ingest(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestReport, CourierError> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| CourierError::Unauthenticated("no app secret configured".into()))?;
        if let Err(e) = verifier.verify(body, signature) {
            record("unauthenticated", 1);
            warn!(error = %e, "webhook delivery rejected");
            return Err(e);
        }

        let parsed = match parse_payload(body, Utc::now()) {
            Ok(parsed) => parsed,
            Err(e) => {
                record("malformed", 1);
                warn!(error = %e, "webhook delivery rejected");
                return Err(e);
            }
        };

        let mut report = IngestReport {
            skipped: parsed.skipped,
            ..IngestReport::default()
        };
        for event in parsed.events {
            match self.append_with_retry(&event).await {
                Ok(AppendOutcome::Inserted) => {
                    report.persisted += 1;
                    debug!(platform_event_id = %event.platform_event_id, "event persisted");
                    // No subscribers is fine.
                    let _ = self.events_tx.send(event);
                }
                Ok(AppendOutcome::Duplicate) => {
                    report.duplicates += 1;
                    debug!(platform_event_id = %event.platform_event_id, "duplicate event");
                }
                Err(e) => {
                    report.store_failures += 1;
                    warn!(platform_event_id = %event.platform_event_id, error = %e, "event not persisted");
                }
            }
        }

        record("persisted", report.persisted);
        record("duplicate", report.duplicates);
        record("skipped", report.skipped);
        record("store_failure", report.store_failures);

        if !report.acknowledged() {
            return Err(CourierError::store(format!(
                "{} event(s) not persisted; delivery left unacknowledged",
                report.store_failures
            )));
        }
        info!(
            persisted = report.persisted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "webhook delivery acknowledged"
        );
        Ok(report)
    }

    async fn append_with_retry(
        &self,
        event: &InboundMessageEvent,
    ) -> Result<AppendOutcome, CourierError> {
        let mut attempt = 0;
        loop {
            match self.log.append(event).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt + 1 < self.store_attempts => {
                    let delay = self.store_backoff.delay(attempt);
                    debug!(attempt, ?delay, error = %e, "event append failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn record(outcome: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!("courier_webhook_events_total", "outcome" => outcome)
            .increment(count as u64);
    }
}
