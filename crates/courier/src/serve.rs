// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve`: wires storage, the platform client, the credential
//! lifecycle and the message pipeline behind the HTTP gateway.

use std::sync::Arc;

use tracing::{error, info, warn};

use courier_auth::{RefreshScheduler, TokenExchange, TracingAlertSink};
use courier_config::CourierConfig;
use courier_core::{CourierError, HealthStatus, KeyedLocks, PluginAdapter};
use courier_dispatch::Dispatcher;
use courier_gateway::{AppState, AuthConfig, HealthState};
use courier_platform::GraphClient;
use courier_prometheus::PrometheusAdapter;
use courier_storage::SqliteStore;
use courier_webhook::IngestionHandler;

use crate::shutdown;

pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.logging.level);
    info!("starting courier serve");

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let platform = Arc::new(GraphClient::new(&config.platform)?);
    if let HealthStatus::Degraded(reason) = platform.health_check().await? {
        warn!(%reason, "platform client degraded");
    }

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    // Shared by exchange and refresh so they serialize per subject.
    let locks = KeyedLocks::new();
    let exchange = Arc::new(TokenExchange::new(
        platform.clone(),
        store.clone(),
        locks.clone(),
        &config.exchange,
    ));
    let scheduler = Arc::new(RefreshScheduler::new(
        store.clone(),
        platform.clone(),
        Arc::new(TracingAlertSink),
        locks,
        &config.refresh,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        platform.clone(),
        store.clone(),
        store.clone(),
        &config.dispatch,
    ));
    let ingestion = Arc::new(IngestionHandler::new(
        store.clone(),
        &config.webhook,
        config.webhook_app_secret(),
    ));

    let mut adapters: Vec<Arc<dyn PluginAdapter>> = vec![
        store.clone() as Arc<dyn PluginAdapter>,
        platform.clone() as Arc<dyn PluginAdapter>,
    ];
    let prometheus_render = prometheus.map(|adapter| {
        adapters.push(adapter.clone());
        Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>
    });

    if config.server.bearer_token.is_none() {
        warn!("server.bearer_token is not set; /v1 routes will reject every request");
    }

    let state = AppState {
        credentials: store.clone(),
        events: store.clone(),
        exchange,
        scheduler: scheduler.clone(),
        dispatcher,
        ingestion,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
            adapters,
            prometheus_render,
        },
    };

    let cancel = shutdown::install_signal_handler();

    let scheduler_task = if config.refresh.enabled {
        let cancel = cancel.clone();
        Some(tokio::spawn(async move { scheduler.run(cancel).await }))
    } else {
        info!("refresh scheduler disabled");
        None
    };

    let served = courier_gateway::start_server(&config.server, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with error");
    }
    // A server failure must stop the scheduler too.
    cancel.cancel();

    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            error!(error = %e, "refresh scheduler task failed");
        }
    }

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "store shutdown failed");
    }
    info!("courier stopped");
    served
}

/// `RUST_LOG` overrides `logging.level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
