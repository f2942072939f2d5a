// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence interfaces: credential store, event log, dispatch ledger.
//!
//! All failures of the backing store surface as
//! [`CourierError::StoreUnavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CourierError;
use crate::types::{
    AppendOutcome, Credential, DispatchRecord, DispatchState, InboundMessageEvent, LoggedEvent,
    OutboundMessageRequest, RefreshState,
};

/// Durable keyed storage for credentials, at most one per subject.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, subject_id: &str) -> Result<Option<Credential>, CourierError>;

    /// Inserts or replaces the credential for `credential.subject_id`.
    async fn put(&self, credential: &Credential) -> Result<(), CourierError>;

    /// Credentials expiring strictly before `cutoff`, soonest first.
    async fn list_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Credential>, CourierError>;

    /// Removes the credential. Returns whether one existed.
    async fn delete(&self, subject_id: &str) -> Result<bool, CourierError>;

    async fn list_by_state(&self, state: RefreshState) -> Result<Vec<Credential>, CourierError>;
}

/// Append-only log of inbound events, keyed by platform event id.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn exists_by_id(&self, platform_event_id: &str) -> Result<bool, CourierError>;

    /// Atomically inserts the event unless its id is already present.
    async fn append(&self, event: &InboundMessageEvent) -> Result<AppendOutcome, CourierError>;

    /// Events with a sequence greater than `after`, in arrival order.
    async fn read_after(&self, after: i64, limit: usize) -> Result<Vec<LoggedEvent>, CourierError>;

    async fn count(&self) -> Result<u64, CourierError>;
}

/// Durable `idempotency_key -> dispatch_state` records.
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// Returns the existing record for the key, or inserts a new `Pending`
    /// one. Never overwrites.
    async fn begin(&self, request: &OutboundMessageRequest)
    -> Result<DispatchRecord, CourierError>;

    /// Increments the attempt counter before a send. Returns the new count.
    async fn record_attempt(&self, idempotency_key: &str) -> Result<u32, CourierError>;

    /// Moves the record to a terminal state.
    async fn complete(
        &self,
        idempotency_key: &str,
        state: DispatchState,
        platform_message_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<DispatchRecord, CourierError>;

    async fn get(&self, idempotency_key: &str) -> Result<Option<DispatchRecord>, CourierError>;
}
