// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`CourierError`] to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use courier_core::{CourierError, ErrorKind};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug)]
pub struct ApiError(pub CourierError);

impl From<CourierError> for ApiError {
    fn from(e: CourierError) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidCode | ErrorKind::MalformedPayload => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::NoCredential | ErrorKind::RefreshExhausted => StatusCode::CONFLICT,
        ErrorKind::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpgradeFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamUnavailable | ErrorKind::StoreUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::Config | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, %kind, "request failed");
        }
        // Store internals stay in the log.
        let error = match &self.0 {
            CourierError::StoreUnavailable { .. } => "store unavailable".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

/// Shorthand for ad-hoc errors such as 404s.
pub fn error_response(status: StatusCode, kind: ErrorKind, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            kind,
        }),
    )
        .into_response()
}
