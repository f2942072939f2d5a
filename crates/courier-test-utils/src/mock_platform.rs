// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform client for deterministic testing.
//!
//! Each operation pops a scripted result if one was queued and otherwise
//! succeeds with a predictable value. Every call is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{
    CourierError, LongLivedGrant, OutboundMessageRequest, PlatformClient, SendReceipt,
    ShortLivedGrant,
};

/// Lifetime granted by default to upgraded and refreshed tokens.
pub const DEFAULT_LIFETIME_DAYS: i64 = 60;

type Script<T> = Mutex<VecDeque<Result<T, CourierError>>>;

/// A scripted [`PlatformClient`].
pub struct MockPlatform {
    exchange_script: Script<ShortLivedGrant>,
    upgrade_script: Script<LongLivedGrant>,
    refresh_script: Script<LongLivedGrant>,
    send_script: Script<SendReceipt>,
    subjects: Mutex<HashMap<String, String>>,
    default_subject: String,
    refresh_delay: Mutex<Option<Duration>>,
    upgrade_delay: Mutex<Option<Duration>>,
    exchange_calls: AtomicUsize,
    upgrade_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    counter: AtomicUsize,
    sent: Mutex<Vec<(String, OutboundMessageRequest)>>,
    refreshed_tokens: Mutex<Vec<String>>,
}

impl MockPlatform {
    /// Codes resolve to `subject-1` unless mapped with [`MockPlatform::map_code`].
    pub fn new() -> Self {
        Self {
            exchange_script: Mutex::new(VecDeque::new()),
            upgrade_script: Mutex::new(VecDeque::new()),
            refresh_script: Mutex::new(VecDeque::new()),
            send_script: Mutex::new(VecDeque::new()),
            subjects: Mutex::new(HashMap::new()),
            default_subject: "subject-1".to_string(),
            refresh_delay: Mutex::new(None),
            upgrade_delay: Mutex::new(None),
            exchange_calls: AtomicUsize::new(0),
            upgrade_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            refreshed_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Maps an authorization code to the subject it authenticates.
    pub async fn map_code(&self, code: &str, subject_id: &str) {
        self.subjects
            .lock()
            .await
            .insert(code.to_string(), subject_id.to_string());
    }

    pub async fn push_exchange(&self, result: Result<ShortLivedGrant, CourierError>) {
        self.exchange_script.lock().await.push_back(result);
    }

    pub async fn push_upgrade(&self, result: Result<LongLivedGrant, CourierError>) {
        self.upgrade_script.lock().await.push_back(result);
    }

    pub async fn push_refresh(&self, result: Result<LongLivedGrant, CourierError>) {
        self.refresh_script.lock().await.push_back(result);
    }

    pub async fn push_send(&self, result: Result<SendReceipt, CourierError>) {
        self.send_script.lock().await.push_back(result);
    }

    /// Makes every refresh call sleep first, to hold renewals in flight.
    pub async fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().await = Some(delay);
    }

    /// Makes every upgrade call sleep first.
    pub async fn set_upgrade_delay(&self, delay: Duration) {
        *self.upgrade_delay.lock().await = Some(delay);
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn upgrade_calls(&self) -> usize {
        self.upgrade_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Every send attempt that reached the platform, successful or not.
    pub async fn sent(&self) -> Vec<(String, OutboundMessageRequest)> {
        self.sent.lock().await.clone()
    }

    pub async fn send_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Tokens presented to the refresh endpoint, in call order.
    pub async fn refreshed_tokens(&self) -> Vec<String> {
        self.refreshed_tokens.lock().await.clone()
    }

    fn next_id(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn exchange_code(&self, code: &str) -> Result<ShortLivedGrant, CourierError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.exchange_script.lock().await.pop_front() {
            return result;
        }
        let subject_id = self
            .subjects
            .lock()
            .await
            .get(code)
            .cloned()
            .unwrap_or_else(|| self.default_subject.clone());
        Ok(ShortLivedGrant {
            access_token: format!("short-{code}-{}", self.next_id()),
            subject_id,
            expires_in: Some(chrono::Duration::hours(1)),
        })
    }

    async fn upgrade(&self, short_lived_token: &str) -> Result<LongLivedGrant, CourierError> {
        self.upgrade_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.upgrade_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(result) = self.upgrade_script.lock().await.pop_front() {
            return result;
        }
        Ok(LongLivedGrant {
            access_token: format!("long-{short_lived_token}"),
            expires_in: chrono::Duration::days(DEFAULT_LIFETIME_DAYS),
        })
    }

    async fn refresh(&self, long_lived_token: &str) -> Result<LongLivedGrant, CourierError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed_tokens
            .lock()
            .await
            .push(long_lived_token.to_string());
        let delay = *self.refresh_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(result) = self.refresh_script.lock().await.pop_front() {
            return result;
        }
        Ok(LongLivedGrant {
            access_token: format!("refreshed-{}", self.next_id()),
            expires_in: chrono::Duration::days(DEFAULT_LIFETIME_DAYS),
        })
    }

    async fn send_message(
        &self,
        access_token: &str,
        request: &OutboundMessageRequest,
    ) -> Result<SendReceipt, CourierError> {
        self.sent
            .lock()
            .await
            .push((access_token.to_string(), request.clone()));
        if let Some(result) = self.send_script.lock().await.pop_front() {
            return result;
        }
        Ok(SendReceipt {
            platform_message_id: Some(format!("mid.{}", self.next_id())),
        })
    }
}
