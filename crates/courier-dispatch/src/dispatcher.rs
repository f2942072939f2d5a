// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! At-most-once outbound sends.
//!
//! Every send is preceded by a durable `record_attempt` in the
//! [`DispatchLedger`], so a process that dies mid-send leaves evidence that a
//! send may have happened. Without platform-side idempotency such a record is
//! failed rather than resent.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use courier_config::model::DispatchConfig;
use courier_core::{
    Backoff, CourierError, CredentialStore, DispatchLedger, DispatchOutcome, DispatchRecord,
    DispatchState, KeyedLocks, OutboundMessageRequest, PlatformClient,
};

pub struct Dispatcher {
    platform: Arc<dyn PlatformClient>,
    credentials: Arc<dyn CredentialStore>,
    ledger: Arc<dyn DispatchLedger>,
    /// Keyed by idempotency key, not subject.
    in_flight: KeyedLocks,
    max_attempts: u32,
    backoff: Backoff,
    platform_idempotency: bool,
}

impl Dispatcher {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        credentials: Arc<dyn CredentialStore>,
        ledger: Arc<dyn DispatchLedger>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            platform,
            credentials,
            ledger,
            in_flight: KeyedLocks::new(),
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::new(
                Duration::from_millis(config.initial_backoff_ms),
                Duration::from_millis(config.max_backoff_ms),
            ),
            platform_idempotency: config.platform_idempotency,
        }
    }

    /// Sends `request` at most once per idempotency key.
    ///
    /// Returns the terminal outcome, or the recorded one when the key was
    /// already terminal. A subject without a usable credential gets
    /// `NoCredential` and the key's record is completed as failed with no
    /// attempts.
    #[instrument(skip_all, fields(idempotency_key = %request.idempotency_key, subject_id = %request.subject_id))]
    pub async fn dispatch(
        &self,
        request: &OutboundMessageRequest,
    ) -> Result<DispatchOutcome, CourierError> {
        validate(request)?;
        let _guard = self.in_flight.lock(&request.idempotency_key).await;

        let record = self.ledger.begin(request).await?;
        if record.state.is_terminal() {
            info!(state = %record.state, "idempotency key already terminal, not resending");
            metrics::counter!("courier_dispatch_total", "state" => "replayed").increment(1);
            return Ok(DispatchOutcome::from(&record));
        }
        if !same_request(&record, request) {
            return Err(CourierError::Rejected {
                message: "idempotency key was already used for a different message".to_string(),
            });
        }
        if record.attempts > 0 && !self.platform_idempotency {
            let record = self
                .finish(
                    &record.idempotency_key,
                    DispatchState::Failed,
                    None,
                    Some("outcome unknown: an earlier send was interrupted"),
                )
                .await?;
            warn!(attempts = record.attempts, "interrupted dispatch marked failed");
            return Ok(DispatchOutcome::from(&record));
        }

        let credential = match self.credentials.get(&request.subject_id).await? {
            Some(c) if c.is_usable(Utc::now()) => c,
            _ => {
                let err = CourierError::NoCredential {
                    subject_id: request.subject_id.clone(),
                };
                // Nothing was sent; the key is closed out as failed.
                self.ledger
                    .complete(
                        &request.idempotency_key,
                        DispatchState::Failed,
                        None,
                        Some(&err.to_string()),
                    )
                    .await?;
                warn!("no usable credential for sending subject");
                metrics::counter!("courier_dispatch_total", "state" => "no_credential")
                    .increment(1);
                return Err(err);
            }
        };

        loop {
            let attempts = self.ledger.record_attempt(&request.idempotency_key).await?;
            match self
                .platform
                .send_message(&credential.access_token, request)
                .await
            {
                Ok(receipt) => {
                    let record = self
                        .finish(
                            &request.idempotency_key,
                            DispatchState::Sent,
                            receipt.platform_message_id.as_deref(),
                            None,
                        )
                        .await?;
                    info!(attempts, "message sent");
                    return Ok(DispatchOutcome::from(&record));
                }
                Err(e) if self.should_retry(&e, attempts) => {
                    let delay = self.backoff.delay_with_jitter(attempts.saturating_sub(1));
                    warn!(attempts, ?delay, error = %e, "send failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let reason = if e.is_ambiguous() && !self.platform_idempotency {
                        format!("outcome unknown: {e}")
                    } else {
                        e.to_string()
                    };
                    let record = self
                        .finish(
                            &request.idempotency_key,
                            DispatchState::Failed,
                            None,
                            Some(&reason),
                        )
                        .await?;
                    warn!(attempts, error = %e, "dispatch failed");
                    return Ok(DispatchOutcome::from(&record));
                }
            }
        }
    }

    /// Recorded outcome for `idempotency_key`, if any.
    pub async fn status(&self, idempotency_key: &str) -> Result<Option<DispatchOutcome>, CourierError> {
        Ok(self
            .ledger
            .get(idempotency_key)
            .await?
            .as_ref()
            .map(DispatchOutcome::from))
    }

    fn should_retry(&self, error: &CourierError, attempts: u32) -> bool {
        if attempts >= self.max_attempts || !error.is_transient() {
            return false;
        }
        // A timed-out send may have been delivered.
        !error.is_ambiguous() || self.platform_idempotency
    }

    async fn finish(
        &self,
        key: &str,
        state: DispatchState,
        platform_message_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<DispatchRecord, CourierError> {
        let record = self
            .ledger
            .complete(key, state, platform_message_id, error)
            .await?;
        metrics::counter!("courier_dispatch_total", "state" => record.state.to_string())
            .increment(1);
        Ok(record)
    }
}

fn validate(request: &OutboundMessageRequest) -> Result<(), CourierError> {
    let missing = [
        ("idempotency_key", &request.idempotency_key),
        ("subject_id", &request.subject_id),
        ("recipient_id", &request.recipient_id),
        ("body", &request.body),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());
    match missing {
        Some((field, _)) => Err(CourierError::MalformedPayload(format!("{field} is empty"))),
        None => Ok(()),
    }
}

fn same_request(record: &DispatchRecord, request: &OutboundMessageRequest) -> bool {
    record.subject_id == request.subject_id
        && record.recipient_id == request.recipient_id
        && record.body == request.body
}
