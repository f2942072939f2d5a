// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the listening server.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_auth::{RefreshScheduler, TokenExchange};
use courier_config::model::ServerConfig;
use courier_core::{CourierError, CredentialStore, EventLog, PluginAdapter};
use courier_dispatch::Dispatcher;
use courier_webhook::IngestionHandler;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics routes.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
    /// Adapters whose health is reported by `/health`.
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub events: Arc<dyn EventLog>,
    pub exchange: Arc<TokenExchange>,
    pub scheduler: Arc<RefreshScheduler>,
    pub dispatcher: Arc<Dispatcher>,
    pub ingestion: Arc<IngestionHandler>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Builds the full route table.
pub fn build_router(state: AppState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route(
            "/webhook",
            get(handlers::webhook_handshake).post(handlers::webhook_delivery),
        )
        .route("/auth/callback", get(handlers::oauth_callback))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_message))
        .route("/v1/messages/{idempotency_key}", get(handlers::get_message))
        .route("/v1/credentials", get(handlers::list_credentials))
        .route(
            "/v1/credentials/{subject_id}",
            get(handlers::get_credential).delete(handlers::delete_credential),
        )
        .route(
            "/v1/credentials/{subject_id}/reset",
            post(handlers::reset_credential),
        )
        .route("/v1/events", get(handlers::list_events))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves until `cancel` fires, then drains in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), CourierError> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("courier listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| CourierError::Internal(format!("server error: {e}")))?;

    tracing::info!("http server stopped");
    Ok(())
}
