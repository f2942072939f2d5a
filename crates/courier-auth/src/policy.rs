// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! When a credential is due for renewal, and how long to back off after a
//! failed attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_config::model::RefreshConfig;
use courier_core::{Backoff, Credential, RefreshState, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    /// Renew once remaining lifetime is below this fraction of the granted lifetime.
    pub lookahead_fraction: f64,
    /// How far ahead each scan looks for expiring credentials.
    pub scan_window: chrono::Duration,
    pub backoff: Backoff,
    pub max_consecutive_failures: u32,
}

impl RefreshPolicy {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self {
            lookahead_fraction: config.lookahead_fraction,
            scan_window: chrono::Duration::seconds(
                i64::try_from(config.scan_window_secs).unwrap_or(i64::MAX / 1000),
            ),
            backoff: Backoff::new(
                Duration::from_secs(config.initial_backoff_secs),
                Duration::from_secs(config.max_backoff_secs),
            ),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Whether the scheduler may renew `credential` at `now`.
    ///
    /// Short-lived and `refresh_failed` credentials are never due. A
    /// credential in backoff is due only once `next_refresh_at` has passed.
    pub fn is_due(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        if credential.token_kind != TokenKind::LongLived
            || credential.refresh_state == RefreshState::RefreshFailed
        {
            return false;
        }
        if let Some(next) = credential.next_refresh_at {
            if next > now {
                return false;
            }
        }
        credential.within_lookahead(now, self.lookahead_fraction)
    }

    /// Delay before the next attempt after `attempts` consecutive failures.
    pub fn retry_delay(&self, attempts: u32) -> chrono::Duration {
        let delay = self.backoff.delay_with_jitter(attempts.saturating_sub(1));
        chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn policy() -> RefreshPolicy {
        RefreshPolicy::from_config(&RefreshConfig::default())
    }

    #[test]
    fn due_only_inside_lookahead() {
        let issued = Utc::now();
        let cred = Credential::long_lived("u1", "t", issued, ChronoDuration::days(60));
        assert!(!policy().is_due(&cred, issued + ChronoDuration::days(40)));
        assert!(policy().is_due(&cred, issued + ChronoDuration::days(50)));
    }

    #[test]
    fn failed_and_short_lived_are_never_due() {
        let issued = Utc::now();
        let late = issued + ChronoDuration::days(59);
        let mut cred = Credential::long_lived("u1", "t", issued, ChronoDuration::days(60));
        cred.refresh_state = RefreshState::RefreshFailed;
        assert!(!policy().is_due(&cred, late));

        cred.refresh_state = RefreshState::Fresh;
        cred.token_kind = TokenKind::ShortLived;
        assert!(!policy().is_due(&cred, late));
    }

    #[test]
    fn backoff_window_defers_renewal() {
        let issued = Utc::now();
        let now = issued + ChronoDuration::days(55);
        let mut cred = Credential::long_lived("u1", "t", issued, ChronoDuration::days(60));
        cred.refresh_state = RefreshState::RefreshPending;
        cred.next_refresh_at = Some(now + ChronoDuration::minutes(5));
        assert!(!policy().is_due(&cred, now));
        assert!(policy().is_due(&cred, now + ChronoDuration::minutes(6)));
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        let p = policy();
        assert!(p.retry_delay(1) <= ChronoDuration::seconds(30));
        assert!(p.retry_delay(2) > ChronoDuration::seconds(30));
        assert!(p.retry_delay(20) <= ChronoDuration::seconds(3600));
        assert!(!p.is_exhausted(4));
        assert!(p.is_exhausted(5));
    }
}
