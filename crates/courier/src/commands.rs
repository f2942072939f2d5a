// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands that operate on the local store without a server.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use courier_auth::TokenExchange;
use courier_config::CourierConfig;
use courier_core::{
    CourierError, Credential, CredentialStore, KeyedLocks, OutboundMessageRequest, PluginAdapter,
    RefreshState,
};
use courier_dispatch::Dispatcher;
use courier_platform::GraphClient;
use courier_storage::SqliteStore;

/// Token-free view of a credential for terminal output.
#[derive(Debug, Serialize)]
struct CredentialLine {
    subject_id: String,
    refresh_state: RefreshState,
    expires_at: String,
    refresh_attempts: u32,
    last_error: Option<String>,
}

impl From<&Credential> for CredentialLine {
    fn from(c: &Credential) -> Self {
        Self {
            subject_id: c.subject_id.clone(),
            refresh_state: c.refresh_state,
            expires_at: c.expires_at.to_rfc3339(),
            refresh_attempts: c.refresh_attempts,
            last_error: c.last_error.clone(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CourierError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CourierError::Internal(format!("failed to render output: {e}")))?;
    println!("{text}");
    Ok(())
}

async fn open_store(config: &CourierConfig) -> Result<Arc<SqliteStore>, CourierError> {
    Ok(Arc::new(SqliteStore::open(&config.storage).await?))
}

pub async fn exchange(config: &CourierConfig, code: &str) -> Result<(), CourierError> {
    let store = open_store(config).await?;
    let platform = Arc::new(GraphClient::new(&config.platform)?);
    let exchange = TokenExchange::new(platform, store.clone(), KeyedLocks::new(), &config.exchange);
    let credential = exchange.exchange_code(code).await?;
    store.shutdown().await?;
    print_json(&CredentialLine::from(&credential))
}

pub async fn send(
    config: &CourierConfig,
    subject: String,
    recipient: String,
    key: Option<String>,
    text: String,
) -> Result<(), CourierError> {
    let store = open_store(config).await?;
    let platform = Arc::new(GraphClient::new(&config.platform)?);
    let dispatcher = Dispatcher::new(platform, store.clone(), store.clone(), &config.dispatch);

    let mut request = OutboundMessageRequest::new(subject, recipient, text);
    if let Some(key) = key {
        request = request.with_key(key);
    }
    let outcome = dispatcher.dispatch(&request).await?;
    store.shutdown().await?;
    print_json(&outcome)
}

pub async fn list_credentials(
    config: &CourierConfig,
    state: Option<String>,
) -> Result<(), CourierError> {
    let store = open_store(config).await?;
    let credentials = match state {
        Some(raw) => {
            let state = RefreshState::from_str(&raw)
                .map_err(|_| CourierError::Config(format!("unknown refresh state: {raw}")))?;
            store.list_by_state(state).await?
        }
        None => {
            store
                .list_expiring_before(Utc::now() + Duration::days(36_500))
                .await?
        }
    };
    let lines: Vec<CredentialLine> = credentials.iter().map(CredentialLine::from).collect();
    print_json(&lines)
}

pub async fn revoke(config: &CourierConfig, subject: &str) -> Result<(), CourierError> {
    let store = open_store(config).await?;
    if store.delete(subject).await? {
        eprintln!("courier: credential for {subject} deleted");
        Ok(())
    } else {
        Err(CourierError::NoCredential {
            subject_id: subject.to_string(),
        })
    }
}
