// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrappers that simulate an unavailable database.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use courier_core::{
    AppendOutcome, CourierError, Credential, CredentialStore, EventLog, InboundMessageEvent,
    LoggedEvent, RefreshState,
};

/// Countdown of injected failures; `usize::MAX` never runs out.
struct Outage(AtomicUsize);

impl Outage {
    fn new(failures: usize) -> Self {
        Self(AtomicUsize::new(failures))
    }

    fn set(&self, failures: usize) {
        self.0.store(failures, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

/// Fails the next `failures` calls to `append`, then delegates.
pub struct FlakyEventLog {
    inner: Arc<dyn EventLog>,
    outage: Outage,
    append_calls: AtomicUsize,
}

impl FlakyEventLog {
    pub fn new(inner: Arc<dyn EventLog>, failures: usize) -> Self {
        Self {
            inner,
            outage: Outage::new(failures),
            append_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every future append fail.
    pub fn fail_forever(&self) {
        self.outage.set(usize::MAX);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventLog for FlakyEventLog {
    async fn exists_by_id(&self, platform_event_id: &str) -> Result<bool, CourierError> {
        self.inner.exists_by_id(platform_event_id).await
    }

    async fn append(&self, event: &InboundMessageEvent) -> Result<AppendOutcome, CourierError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.outage.take() {
            return Err(CourierError::store("simulated store outage"));
        }
        self.inner.append(event).await
    }

    async fn read_after(&self, after: i64, limit: usize) -> Result<Vec<LoggedEvent>, CourierError> {
        self.inner.read_after(after, limit).await
    }

    async fn count(&self) -> Result<u64, CourierError> {
        self.inner.count().await
    }
}

/// Fails the next `failures` calls to `put`, then delegates. Reads always
/// succeed.
pub struct FlakyCredentialStore {
    inner: Arc<dyn CredentialStore>,
    outage: Outage,
    put_calls: AtomicUsize,
}

impl FlakyCredentialStore {
    pub fn new(inner: Arc<dyn CredentialStore>, failures: usize) -> Self {
        Self {
            inner,
            outage: Outage::new(failures),
            put_calls: AtomicUsize::new(0),
        }
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for FlakyCredentialStore {
    async fn get(&self, subject_id: &str) -> Result<Option<Credential>, CourierError> {
        self.inner.get(subject_id).await
    }

    async fn put(&self, credential: &Credential) -> Result<(), CourierError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.outage.take() {
            return Err(CourierError::store("simulated store outage"));
        }
        self.inner.put(credential).await
    }

    async fn list_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Credential>, CourierError> {
        self.inner.list_expiring_before(cutoff).await
    }

    async fn delete(&self, subject_id: &str) -> Result<bool, CourierError> {
        self.inner.delete(subject_id).await
    }

    async fn list_by_state(&self, state: RefreshState) -> Result<Vec<Credential>, CourierError> {
        self.inner.list_by_state(state).await
    }
}
