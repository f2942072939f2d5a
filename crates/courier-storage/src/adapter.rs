// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the credential store, event log, and dispatch
//! ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::{
    AdapterType, AppendOutcome, CourierError, Credential, CredentialStore, DispatchLedger,
    DispatchRecord, DispatchState, EventLog, HealthStatus, InboundMessageEvent, LoggedEvent,
    OutboundMessageRequest, PluginAdapter, RefreshState, TokenKind,
};

use crate::crypto::TokenCipher;
use crate::database::Database;
use crate::models::CredentialRow;
use crate::queries;

/// One database backing all three store traits.
///
/// Access tokens are sealed with AES-256-GCM when a cipher is configured.
#[derive(Debug)]
pub struct SqliteStore {
    db: Database,
    cipher: Option<TokenCipher>,
}

impl SqliteStore {
    pub fn new(db: Database, cipher: Option<TokenCipher>) -> Self {
        Self { db, cipher }
    }

    /// Opens the configured database, parsing the optional encryption key.
    pub async fn open(config: &StorageConfig) -> Result<Self, CourierError> {
        let cipher = config
            .token_encryption_key
            .as_deref()
            .map(TokenCipher::from_hex)
            .transpose()?;
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(
            path = %config.database_path,
            encrypted = cipher.is_some(),
            "SQLite store initialized"
        );
        Ok(Self::new(db, cipher))
    }

    pub async fn in_memory() -> Result<Self, CourierError> {
        Ok(Self::new(Database::open_in_memory().await?, None))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Number of credentials in the standing `refresh_failed` condition.
    pub async fn lapsed_count(&self) -> Result<u64, CourierError> {
        queries::credentials::count_by_state(&self.db, RefreshState::RefreshFailed).await
    }

    fn open_rows(&self, rows: Vec<CredentialRow>) -> Result<Vec<Credential>, CourierError> {
        rows.into_iter()
            .map(|row| row.open(self.cipher.as_ref()))
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        match self.db.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn get(&self, subject_id: &str) -> Result<Option<Credential>, CourierError> {
        queries::credentials::get(&self.db, subject_id)
            .await?
            .map(|row| row.open(self.cipher.as_ref()))
            .transpose()
    }

    async fn put(&self, credential: &Credential) -> Result<(), CourierError> {
        if credential.token_kind != TokenKind::LongLived {
            return Err(CourierError::Internal(format!(
                "refusing to persist {} credential for {}",
                credential.token_kind, credential.subject_id
            )));
        }
        let row = CredentialRow::seal(credential, self.cipher.as_ref())?;
        queries::credentials::upsert(&self.db, row).await
    }

    async fn list_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Credential>, CourierError> {
        let rows = queries::credentials::list_expiring_before(&self.db, cutoff).await?;
        self.open_rows(rows)
    }

    async fn delete(&self, subject_id: &str) -> Result<bool, CourierError> {
        queries::credentials::delete(&self.db, subject_id).await
    }

    async fn list_by_state(&self, state: RefreshState) -> Result<Vec<Credential>, CourierError> {
        let rows = queries::credentials::list_by_state(&self.db, state).await?;
        self.open_rows(rows)
    }
}

#[async_trait]
impl EventLog for SqliteStore {
    async fn exists_by_id(&self, platform_event_id: &str) -> Result<bool, CourierError> {
        queries::events::exists_by_id(&self.db, platform_event_id).await
    }

    async fn append(&self, event: &InboundMessageEvent) -> Result<AppendOutcome, CourierError> {
        queries::events::append(&self.db, event).await
    }

    async fn read_after(&self, after: i64, limit: usize) -> Result<Vec<LoggedEvent>, CourierError> {
        queries::events::read_after(&self.db, after, limit).await
    }

    async fn count(&self) -> Result<u64, CourierError> {
        queries::events::count(&self.db).await
    }
}

#[async_trait]
impl DispatchLedger for SqliteStore {
    async fn begin(
        &self,
        request: &OutboundMessageRequest,
    ) -> Result<DispatchRecord, CourierError> {
        queries::dispatches::begin(&self.db, request).await
    }

    async fn record_attempt(&self, idempotency_key: &str) -> Result<u32, CourierError> {
        queries::dispatches::record_attempt(&self.db, idempotency_key).await
    }

    async fn complete(
        &self,
        idempotency_key: &str,
        state: DispatchState,
        platform_message_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<DispatchRecord, CourierError> {
        queries::dispatches::complete(&self.db, idempotency_key, state, platform_message_id, error)
            .await
    }

    async fn get(&self, idempotency_key: &str) -> Result<Option<DispatchRecord>, CourierError> {
        queries::dispatches::get(&self.db, idempotency_key).await
    }
}
