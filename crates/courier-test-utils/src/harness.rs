// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database harness for integration tests.
//!
//! `TestHarness` owns a temporary directory with a real SQLite store and the
//! mock collaborators. Dropping it removes the database.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use courier_config::CourierConfig;
use courier_config::model::StorageConfig;
use courier_core::{CourierError, Credential, CredentialStore};
use courier_storage::SqliteStore;

use crate::alerts::RecordingAlertSink;
use crate::mock_platform::MockPlatform;

pub struct TestHarness {
    dir: TempDir,
    pub config: CourierConfig,
    pub store: Arc<SqliteStore>,
    pub platform: Arc<MockPlatform>,
    pub alerts: Arc<RecordingAlertSink>,
}

impl TestHarness {
    /// Builds a harness with default config, retry delays shrunk to keep tests fast.
    pub async fn new() -> Result<Self, CourierError> {
        let dir = TempDir::new().map_err(CourierError::store)?;
        let mut config = CourierConfig::default();
        config.storage = StorageConfig {
            database_path: dir.path().join("courier.db").to_string_lossy().into_owned(),
            wal_mode: true,
            token_encryption_key: None,
        };
        config.platform.client_id = Some("test-client".into());
        config.platform.client_secret = Some("test-secret".into());
        config.platform.redirect_uri = Some("https://example.test/auth/callback".into());
        config.webhook.verify_token = Some("verify-me".into());
        config.webhook.store_retry_backoff_ms = 1;
        config.exchange.retry_backoff_ms = 1;
        config.dispatch.initial_backoff_ms = 1;
        config.dispatch.max_backoff_ms = 5;
        config.refresh.initial_backoff_secs = 30;
        config.refresh.shutdown_grace_secs = 5;

        let store = Arc::new(SqliteStore::open(&config.storage).await?);
        Ok(Self {
            dir,
            config,
            store,
            platform: Arc::new(MockPlatform::new()),
            alerts: Arc::new(RecordingAlertSink::new()),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("courier.db")
    }

    /// Opens a second store on the same file, as a restarted process would.
    pub async fn reopen_store(&self) -> Result<Arc<SqliteStore>, CourierError> {
        Ok(Arc::new(SqliteStore::open(&self.config.storage).await?))
    }

    /// Stores a long-lived credential issued at `issued_at` with `lifetime`.
    pub async fn seed_credential(
        &self,
        subject_id: &str,
        token: &str,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Credential, CourierError> {
        let credential = Credential::long_lived(subject_id, token, issued_at, lifetime);
        self.store.put(&credential).await?;
        Ok(credential)
    }
}
