// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exporter for Courier metrics.
//!
//! Components record through the `metrics` facade; this crate installs the
//! process-wide recorder and renders the text format served at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter};

pub use recording::{register_metrics, set_lapsed_credentials};

pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the global recorder. Only one recorder may exist per process.
    pub fn new() -> Result<Self, CourierError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            CourierError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;
        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    /// Wraps an existing handle without installing anything.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}
