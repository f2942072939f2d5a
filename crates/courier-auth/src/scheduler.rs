// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background renewal of long-lived credentials.
//!
//! Each pass lists credentials expiring within the scan window, filters the
//! ones the [`RefreshPolicy`] says are due, and renews them concurrently up
//! to `max_concurrent_renewals`. A subject already being renewed or
//! exchanged is skipped for that pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_config::model::RefreshConfig;
use courier_core::{
    AlertSink, Backoff, CourierError, Credential, CredentialStore, KeyedLocks, PlatformClient,
    RefreshState,
};

use crate::policy::RefreshPolicy;

/// Writes of a freshly rotated token before the renewal is abandoned.
const ROTATED_WRITE_ATTEMPTS: u32 = 4;

/// What happened to one subject during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    Renewed { expires_at: DateTime<Utc> },
    RetryScheduled { attempts: u32, next_refresh_at: DateTime<Utc> },
    /// The credential is now `refresh_failed` and an alert was raised.
    Exhausted { attempts: u32 },
    /// Another task holds the subject's lock.
    InFlight,
    /// Re-read under the lock and found no longer due (or gone).
    NotDue,
    ShuttingDown,
}

/// Per-pass counts, logged at the end of every pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassReport {
    pub renewed: usize,
    pub retrying: usize,
    pub exhausted: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct RefreshScheduler {
    store: Arc<dyn CredentialStore>,
    platform: Arc<dyn PlatformClient>,
    alerts: Arc<dyn AlertSink>,
    locks: KeyedLocks,
    policy: RefreshPolicy,
    poll_interval: Duration,
    max_concurrent: usize,
    shutdown_grace: Duration,
    write_backoff: Backoff,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        platform: Arc<dyn PlatformClient>,
        alerts: Arc<dyn AlertSink>,
        locks: KeyedLocks,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            store,
            platform,
            alerts,
            locks,
            policy: RefreshPolicy::from_config(config),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            max_concurrent: config.max_concurrent_renewals.max(1),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            write_backoff: Backoff::new(Duration::from_millis(50), Duration::from_secs(2)),
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Runs passes every `poll_interval` until `cancel` fires.
    ///
    /// On cancellation no new renewals start; renewals already in flight get
    /// up to `shutdown_grace` to finish before they are abandoned.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            max_concurrent = self.max_concurrent,
            "refresh scheduler started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let pass = self.run_pass(&cancel);
            tokio::pin!(pass);
            tokio::select! {
                result = &mut pass => log_pass(result),
                _ = cancel.cancelled() => {
                    match tokio::time::timeout(self.shutdown_grace, &mut pass).await {
                        Ok(result) => log_pass(result),
                        Err(_) => warn!(
                            grace_secs = self.shutdown_grace.as_secs(),
                            "abandoning in-flight renewals after shutdown grace"
                        ),
                    }
                    break;
                }
            }
        }
        info!("refresh scheduler stopped");
    }

    /// A single pass, awaited to completion.
    pub async fn run_once(&self) -> Result<PassReport, CourierError> {
        self.run_pass(&CancellationToken::new()).await
    }

    async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport, CourierError> {
        let now = Utc::now();
        let candidates = self
            .store
            .list_expiring_before(now + self.policy.scan_window)
            .await?;
        let due: Vec<Credential> = candidates
            .into_iter()
            .filter(|c| self.policy.is_due(c, now))
            .collect();
        debug!(due = due.len(), "refresh pass");

        let results: Vec<(String, Result<RenewalOutcome, CourierError>)> =
            futures::stream::iter(due)
                .map(|credential| async move {
                    let subject_id = credential.subject_id;
                    let result = self.renew_if_idle(&subject_id, cancel).await;
                    (subject_id, result)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

        let mut report = PassReport::default();
        for (subject_id, result) in results {
            match result {
                Ok(RenewalOutcome::Renewed { .. }) => report.renewed += 1,
                Ok(RenewalOutcome::RetryScheduled { .. }) => report.retrying += 1,
                Ok(RenewalOutcome::Exhausted { .. }) => report.exhausted += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    error!(subject_id = %subject_id, error = %e, "renewal aborted");
                    report.errors += 1;
                }
            }
        }

        match self.store.list_by_state(RefreshState::RefreshFailed).await {
            Ok(lapsed) => metrics::gauge!("courier_lapsed_credentials").set(lapsed.len() as f64),
            Err(e) => warn!(error = %e, "could not count lapsed credentials"),
        }
        Ok(report)
    }

    async fn renew_if_idle(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RenewalOutcome, CourierError> {
        if cancel.is_cancelled() {
            return Ok(RenewalOutcome::ShuttingDown);
        }
        let Some(_guard) = self.locks.try_lock(subject_id) else {
            debug!(subject_id, "renewal skipped, subject busy");
            return Ok(RenewalOutcome::InFlight);
        };
        self.renew_locked(subject_id).await
    }

    /// Renews one subject now if it is due, waiting for its lock.
    pub async fn renew(&self, subject_id: &str) -> Result<RenewalOutcome, CourierError> {
        let _guard = self.locks.lock(subject_id).await;
        self.renew_locked(subject_id).await
    }

    /// Clears a `refresh_failed` credential so the scheduler retries it.
    ///
    /// Returns `false` when the subject has no credential or is not failed.
    pub async fn reset(&self, subject_id: &str) -> Result<bool, CourierError> {
        let _guard = self.locks.lock(subject_id).await;
        let Some(mut credential) = self.store.get(subject_id).await? else {
            return Ok(false);
        };
        if credential.refresh_state != RefreshState::RefreshFailed {
            return Ok(false);
        }
        credential.refresh_state = RefreshState::RefreshPending;
        credential.refresh_attempts = 0;
        credential.next_refresh_at = None;
        credential.last_error = None;
        self.store.put(&credential).await?;
        info!(subject_id, "refresh state reset");
        Ok(true)
    }

    /// Caller holds the subject's lock.
    async fn renew_locked(&self, subject_id: &str) -> Result<RenewalOutcome, CourierError> {
        let now = Utc::now();
        // Re-read: an exchange may have replaced the credential since the scan.
        let Some(mut credential) = self.store.get(subject_id).await? else {
            return Ok(RenewalOutcome::NotDue);
        };
        if !self.policy.is_due(&credential, now) {
            return Ok(RenewalOutcome::NotDue);
        }

        if credential.refresh_state != RefreshState::RefreshPending {
            credential.refresh_state = RefreshState::RefreshPending;
            self.store.put(&credential).await?;
        }

        match self.platform.refresh(&credential.access_token).await {
            Ok(grant) => {
                let issued_at = Utc::now();
                let granted_expiry = issued_at + grant.expires_in;
                if granted_expiry < credential.expires_at {
                    warn!(
                        subject_id,
                        granted = %granted_expiry,
                        current = %credential.expires_at,
                        "refresh granted a shorter lifetime; keeping current expiry"
                    );
                }
                credential.access_token = grant.access_token;
                credential.issued_at = issued_at;
                credential.expires_at = granted_expiry.max(credential.expires_at);
                credential.refresh_state = RefreshState::Fresh;
                credential.refresh_attempts = 0;
                credential.next_refresh_at = None;
                credential.last_error = None;
                self.persist_rotated(&credential).await?;

                metrics::counter!("courier_refresh_total", "outcome" => "renewed").increment(1);
                info!(subject_id, expires_at = %credential.expires_at, "credential renewed");
                Ok(RenewalOutcome::Renewed {
                    expires_at: credential.expires_at,
                })
            }
            Err(e) => self.record_failure(credential, e, now).await,
        }
    }

    /// The platform has already invalidated the previous token, so losing
    /// this write lapses the credential.
    async fn persist_rotated(&self, credential: &Credential) -> Result<(), CourierError> {
        let mut attempt = 0;
        loop {
            match self.store.put(credential).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < ROTATED_WRITE_ATTEMPTS => {
                    let delay = self.write_backoff.delay_with_jitter(attempt);
                    warn!(
                        subject_id = %credential.subject_id,
                        attempt = attempt + 1,
                        ?delay,
                        error = %e,
                        "rotated credential write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        subject_id = %credential.subject_id,
                        error = %e,
                        "rotated credential could not be stored"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn record_failure(
        &self,
        mut credential: Credential,
        failure: CourierError,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, CourierError> {
        let attempts = credential.refresh_attempts.saturating_add(1);
        credential.refresh_attempts = attempts;
        credential.last_error = Some(failure.to_string());

        // A rejected token will not become valid by retrying.
        let exhausted = self.policy.is_exhausted(attempts) || !failure.is_transient();
        if exhausted {
            credential.refresh_state = RefreshState::RefreshFailed;
            credential.next_refresh_at = None;
            self.store.put(&credential).await?;

            metrics::counter!("courier_refresh_total", "outcome" => "exhausted").increment(1);
            let reason = CourierError::RefreshExhausted {
                subject_id: credential.subject_id.clone(),
                attempts,
            };
            warn!(subject_id = %credential.subject_id, attempts, error = %failure, "{reason}");
            self.alerts
                .credential_lapsed(&credential, &failure.to_string())
                .await;
            return Ok(RenewalOutcome::Exhausted { attempts });
        }

        let next_refresh_at = now + self.policy.retry_delay(attempts);
        credential.refresh_state = RefreshState::RefreshPending;
        credential.next_refresh_at = Some(next_refresh_at);
        self.store.put(&credential).await?;

        metrics::counter!("courier_refresh_total", "outcome" => "retry").increment(1);
        warn!(
            subject_id = %credential.subject_id,
            attempts,
            next_refresh_at = %next_refresh_at,
            error = %failure,
            "renewal failed, will retry"
        );
        Ok(RenewalOutcome::RetryScheduled {
            attempts,
            next_refresh_at,
        })
    }
}

fn log_pass(result: Result<PassReport, CourierError>) {
    match result {
        Ok(report) if report == PassReport::default() => {}
        Ok(report) => info!(
            renewed = report.renewed,
            retrying = report.retrying,
            exhausted = report.exhausted,
            skipped = report.skipped,
            errors = report.errors,
            "refresh pass complete"
        ),
        Err(e) => error!(error = %e, "refresh pass failed"),
    }
}
