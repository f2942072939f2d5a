// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization-code exchange.
//!
//! A code is single-use on the platform side, so the code step is retried at
//! most once and only when the platform provably never processed the request.
//! The upgrade step happens strictly after the code step succeeds, and the
//! credential is written exactly once, after the upgrade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use courier_config::model::ExchangeConfig;
use courier_core::{
    CourierError, Credential, CredentialStore, KeyedLocks, LongLivedGrant, PlatformClient,
    ShortLivedGrant,
};

pub struct TokenExchange {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn CredentialStore>,
    locks: KeyedLocks,
    retry_backoff: Duration,
}

impl TokenExchange {
    /// `locks` must be the same instance the refresh scheduler uses.
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn CredentialStore>,
        locks: KeyedLocks,
        config: &ExchangeConfig,
    ) -> Self {
        Self {
            platform,
            store,
            locks,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Exchanges a one-time authorization code for a stored long-lived credential.
    ///
    /// On success the subject's previous credential, if any, is replaced. On
    /// any failure nothing is written.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, CourierError> {
        let result = self.run(code).await;
        let outcome = match &result {
            Ok(_) => "success".to_string(),
            Err(e) => e.kind().to_string(),
        };
        metrics::counter!("courier_exchange_total", "outcome" => outcome).increment(1);
        result
    }

    async fn run(&self, code: &str) -> Result<Credential, CourierError> {
        if code.trim().is_empty() {
            return Err(CourierError::InvalidCode {
                message: "authorization code is empty".to_string(),
            });
        }

        let short = self.redeem(code).await?;
        debug!(subject_id = %short.subject_id, "authorization code redeemed");

        let long = self.upgrade(&short).await?;
        let credential = Credential::long_lived(
            short.subject_id.clone(),
            long.access_token,
            Utc::now(),
            long.expires_in,
        );

        let _guard = self.locks.lock(&credential.subject_id).await;
        self.persist(&credential).await?;
        info!(
            subject_id = %credential.subject_id,
            expires_at = %credential.expires_at,
            "long-lived credential stored"
        );
        Ok(credential)
    }

    async fn redeem(&self, code: &str) -> Result<ShortLivedGrant, CourierError> {
        match self.platform.exchange_code(code).await {
            Ok(grant) => Ok(grant),
            // Safe to replay: the request never reached the platform.
            Err(e @ CourierError::UpstreamUnavailable { ambiguous: false, .. }) => {
                warn!(error = %e, "code exchange unavailable, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.platform.exchange_code(code).await
            }
            Err(e) => Err(e),
        }
    }

    async fn upgrade(&self, short: &ShortLivedGrant) -> Result<LongLivedGrant, CourierError> {
        let first = self.platform.upgrade(&short.access_token).await;
        let result = match first {
            Err(e) if e.is_transient() => {
                warn!(subject_id = %short.subject_id, error = %e, "upgrade failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.platform.upgrade(&short.access_token).await
            }
            other => other,
        };
        result.map_err(|e| match e {
            CourierError::UpgradeFailed { .. } => e,
            other => CourierError::UpgradeFailed {
                message: other.to_string(),
            },
        })
    }

    async fn persist(&self, credential: &Credential) -> Result<(), CourierError> {
        match self.store.put(credential).await {
            Err(e) if e.is_transient() => {
                warn!(subject_id = %credential.subject_id, error = %e, "credential write failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.store.put(credential).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::RefreshState;
    use courier_test_utils::TestHarness;

    fn exchange(h: &TestHarness) -> TokenExchange {
        TokenExchange::new(
            h.platform.clone(),
            h.store.clone(),
            KeyedLocks::new(),
            &h.config.exchange,
        )
    }

    #[tokio::test]
    async fn code_becomes_stored_long_lived_credential() {
        let h = TestHarness::new().await.unwrap();
        h.platform.map_code("abc123", "alice").await;

        let cred = exchange(&h).exchange_code("abc123").await.unwrap();
        assert_eq!(cred.subject_id, "alice");
        assert!(cred.access_token.starts_with("long-short-abc123"));
        assert_eq!(cred.refresh_state, RefreshState::Fresh);

        let stored = h.store.get("alice").await.unwrap().unwrap();
        assert_eq!(stored.access_token, cred.access_token);
        assert_eq!(
            stored.expires_at.timestamp_millis(),
            cred.expires_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn empty_code_never_reaches_platform() {
        let h = TestHarness::new().await.unwrap();
        let err = exchange(&h).exchange_code("  ").await.unwrap_err();
        assert!(matches!(err, CourierError::InvalidCode { .. }));
        assert_eq!(h.platform.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn ambiguous_code_failure_is_not_replayed() {
        let h = TestHarness::new().await.unwrap();
        h.platform
            .push_exchange(Err(CourierError::UpstreamUnavailable {
                message: "timed out".into(),
                ambiguous: true,
            }))
            .await;

        let err = exchange(&h).exchange_code("abc123").await.unwrap_err();
        assert!(err.is_ambiguous());
        assert_eq!(h.platform.exchange_calls(), 1);
        assert!(h.store.get("subject-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreached_code_failure_is_retried_once() {
        let h = TestHarness::new().await.unwrap();
        h.platform
            .push_exchange(Err(CourierError::upstream("connection refused")))
            .await;

        exchange(&h).exchange_code("abc123").await.unwrap();
        assert_eq!(h.platform.exchange_calls(), 2);
    }

    #[tokio::test]
    async fn upgrade_failure_stores_nothing() {
        let h = TestHarness::new().await.unwrap();
        h.platform
            .push_upgrade(Err(CourierError::Rejected {
                message: "short-lived token expired".into(),
            }))
            .await;

        let err = exchange(&h).exchange_code("abc123").await.unwrap_err();
        assert!(matches!(err, CourierError::UpgradeFailed { .. }));
        assert_eq!(h.platform.upgrade_calls(), 1);
        assert!(h.store.get("subject-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transient_upgrade_failure_retries_then_reports_upgrade_failed() {
        let h = TestHarness::new().await.unwrap();
        for _ in 0..2 {
            h.platform.push_upgrade(Err(CourierError::upstream("503"))).await;
        }

        let err = exchange(&h).exchange_code("abc123").await.unwrap_err();
        assert!(matches!(err, CourierError::UpgradeFailed { .. }));
        assert_eq!(h.platform.upgrade_calls(), 2);
        assert_eq!(h.platform.exchange_calls(), 1);
    }
}
