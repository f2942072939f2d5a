// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status`: reads a running server's `/health`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use courier_config::CourierConfig;
use courier_core::CourierError;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    lapsed_credentials: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub lapsed_credentials: Option<usize>,
    pub url: String,
}

pub(crate) fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub async fn run_status(config: &CourierConfig, json: bool) -> Result<(), CourierError> {
    let url = format!("http://{}:{}/health", config.server.host, config.server.port);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to create HTTP client: {e}")))?;

    // /health answers 503 with a body when degraded, so any response parses.
    let status = match client.get(&url).send().await {
        Ok(resp) => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                CourierError::Internal(format!("failed to parse health response: {e}"))
            })?;
            StatusResponse {
                running: true,
                uptime_human: Some(format_uptime(health.uptime_secs)),
                uptime_secs: Some(health.uptime_secs),
                lapsed_credentials: Some(health.lapsed_credentials),
                status: health.status,
                url,
            }
        }
        Err(_) => StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            lapsed_credentials: None,
            url,
        },
    };

    if json {
        let text = serde_json::to_string_pretty(&status)
            .map_err(|e| CourierError::Internal(format!("failed to render status: {e}")))?;
        println!("{text}");
    } else if status.running {
        println!(
            "courier: {} (up {}, {} lapsed credential(s))",
            status.status,
            status.uptime_human.unwrap_or_default(),
            status.lapsed_credentials.unwrap_or_default()
        );
    } else {
        println!("courier: not running at {}", status.url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formats() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_uptime(2 * 86400 + 3600), "2d 1h 0m");
    }

    #[tokio::test]
    async fn unreachable_server_reports_not_running() {
        let mut config = CourierConfig::default();
        config.server.port = 1;
        run_status(&config, true).await.unwrap();
    }
}
