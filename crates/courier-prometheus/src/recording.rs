// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and the gauges set outside their owning component.

use metrics::{describe_counter, describe_gauge};

/// Describes every Courier metric. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "courier_exchange_total",
        "Authorization-code exchanges by outcome"
    );
    describe_counter!(
        "courier_refresh_total",
        "Credential renewals by outcome (renewed, retry, exhausted)"
    );
    describe_counter!(
        "courier_webhook_events_total",
        "Webhook events by ingestion outcome"
    );
    describe_counter!(
        "courier_dispatch_total",
        "Outbound dispatches by resulting state"
    );
    describe_gauge!(
        "courier_lapsed_credentials",
        "Credentials in refresh_failed awaiting re-authorization"
    );
}

pub fn set_lapsed_credentials(count: u64) {
    metrics::gauge!("courier_lapsed_credentials").set(count as f64);
}
