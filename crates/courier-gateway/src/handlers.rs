// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route handlers.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use courier_core::{
    Credential, CredentialStore, ErrorKind, EventLog, HealthStatus, IngestReport, LoggedEvent,
    OutboundMessageRequest, PluginAdapter, RefreshState, TokenKind,
};
use courier_webhook::{HandshakeParams, SIGNATURE_HEADER};

use crate::error::{ApiError, error_response};
use crate::server::AppState;

const MAX_EVENTS_PAGE: usize = 500;

// --- webhook ---

/// GET /webhook
pub async fn webhook_handshake(
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
) -> Response {
    match state.ingestion.handshake(&params) {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(e) => error_response(StatusCode::FORBIDDEN, e.kind(), e.to_string()),
    }
}

/// POST /webhook
///
/// The body is taken as raw bytes so the signature covers exactly what the
/// platform sent.
pub async fn webhook_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestReport>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let report = state.ingestion.ingest(&body, signature).await?;
    Ok(Json(report))
}

// --- oauth ---

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// What the callback reveals about a stored credential. Never the token.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub subject_id: String,
    pub token_kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// GET /auth/callback
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(error) = query.error {
        let detail = query.error_description.unwrap_or(error);
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidCode,
            format!("authorization denied: {detail}"),
        ));
    }
    let Some(code) = query.code else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidCode,
            "missing code parameter",
        ));
    };
    let credential = state.exchange.exchange_code(&code).await?;
    Ok(Json(CallbackResponse {
        subject_id: credential.subject_id,
        token_kind: credential.token_kind,
        expires_at: credential.expires_at,
    })
    .into_response())
}

// --- dispatch ---

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub subject_id: String,
    pub recipient_id: String,
    pub text: String,
}

/// POST /v1/messages
///
/// The idempotency key comes from the body, then the `Idempotency-Key`
/// header, and is generated when neither is present.
pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> Result<Response, ApiError> {
    let header_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut request = OutboundMessageRequest::new(body.subject_id, body.recipient_id, body.text);
    if let Some(key) = body.idempotency_key.or(header_key) {
        request = request.with_key(key);
    }
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(Json(outcome).into_response())
}

/// GET /v1/messages/{idempotency_key}
pub async fn get_message(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match state.dispatcher.status(&key).await? {
        Some(outcome) => Json(outcome).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            ErrorKind::Internal,
            format!("no dispatch recorded for key {key}"),
        ),
    })
}

// --- credentials ---

/// Credential metadata safe to return to API callers.
#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub subject_id: String,
    pub token_kind: TokenKind,
    pub refresh_state: RefreshState,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_attempts: u32,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<Credential> for CredentialStatus {
    fn from(c: Credential) -> Self {
        Self {
            subject_id: c.subject_id,
            token_kind: c.token_kind,
            refresh_state: c.refresh_state,
            issued_at: c.issued_at,
            expires_at: c.expires_at,
            refresh_attempts: c.refresh_attempts,
            next_refresh_at: c.next_refresh_at,
            last_error: c.last_error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListCredentialsQuery {
    pub state: Option<String>,
}

/// GET /v1/credentials
pub async fn list_credentials(
    State(state): State<AppState>,
    Query(query): Query<ListCredentialsQuery>,
) -> Result<Response, ApiError> {
    let credentials = match query.state.as_deref() {
        Some(raw) => match RefreshState::from_str(raw) {
            Ok(refresh_state) => state.credentials.list_by_state(refresh_state).await?,
            Err(_) => {
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorKind::MalformedPayload,
                    format!("unknown refresh state: {raw}"),
                ));
            }
        },
        None => {
            state
                .credentials
                .list_expiring_before(Utc::now() + Duration::days(36_500))
                .await?
        }
    };
    let statuses: Vec<CredentialStatus> = credentials.into_iter().map(Into::into).collect();
    Ok(Json(statuses).into_response())
}

fn no_credential(subject_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        ErrorKind::NoCredential,
        format!("no credential for subject {subject_id}"),
    )
}

/// GET /v1/credentials/{subject_id}
pub async fn get_credential(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match state.credentials.get(&subject_id).await? {
        Some(credential) => Json(CredentialStatus::from(credential)).into_response(),
        None => no_credential(&subject_id),
    })
}

/// DELETE /v1/credentials/{subject_id}
pub async fn delete_credential(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.credentials.delete(&subject_id).await? {
        tracing::info!(subject_id = %subject_id, "credential revoked");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(no_credential(&subject_id))
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: bool,
}

/// POST /v1/credentials/{subject_id}/reset
pub async fn reset_credential(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.credentials.get(&subject_id).await?.is_none() {
        return Ok(no_credential(&subject_id));
    }
    let reset = state.scheduler.reset(&subject_id).await?;
    Ok(Json(ResetResponse { reset }).into_response())
}

// --- events ---

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub after: i64,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub sequence: i64,
    pub platform_event_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub platform_timestamp: Option<i64>,
}

impl From<LoggedEvent> for EventView {
    fn from(logged: LoggedEvent) -> Self {
        let body = logged.event.body_text();
        Self {
            sequence: logged.sequence,
            platform_event_id: logged.event.platform_event_id,
            sender_id: logged.event.sender_id,
            recipient_id: logged.event.recipient_id,
            body,
            received_at: logged.event.received_at,
            platform_timestamp: logged.event.platform_timestamp,
        }
    }
}

/// GET /v1/events?after=&limit=
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let limit = query.limit.unwrap_or(100).clamp(1, MAX_EVENTS_PAGE);
    let events = state.events.read_after(query.after, limit).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

// --- health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub lapsed_credentials: usize,
    pub adapters: Vec<AdapterHealth>,
}

#[derive(Debug, Serialize)]
pub struct AdapterHealth {
    pub name: String,
    pub status: String,
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// GET /health
///
/// 503 when any adapter is unhealthy. Lapsed credentials are reported but do
/// not fail the check.
pub async fn get_health(State(state): State<AppState>) -> Response {
    let mut adapters = Vec::new();
    let mut healthy = true;
    for adapter in &state.health.adapters {
        let status = adapter
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        healthy &= !matches!(status, HealthStatus::Unhealthy(_));
        adapters.push(AdapterHealth {
            name: adapter.name().to_string(),
            status: describe(&status),
        });
    }

    let lapsed_credentials = match state
        .credentials
        .list_by_state(RefreshState::RefreshFailed)
        .await
    {
        Ok(lapsed) => lapsed.len(),
        Err(e) => {
            healthy = false;
            tracing::warn!(error = %e, "health check could not read credentials");
            0
        }
    };

    let body = HealthResponse {
        status: if healthy { "ok" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        lapsed_credentials,
        adapters,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
