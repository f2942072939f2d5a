// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Courier.
//!
//! This crate provides the error taxonomy, domain types, and the trait
//! seams (stores, platform client, alert sink) used throughout the Courier
//! workspace, along with the backoff schedule and per-key locking shared by
//! the exchange, refresh, and dispatch components.

pub mod backoff;
pub mod error;
pub mod locks;
pub mod traits;
pub mod types;

pub use backoff::Backoff;
pub use error::{CourierError, ErrorKind};
pub use locks::{KeyGuard, KeyedLocks};
pub use types::{
    AdapterType, AppendOutcome, Credential, DispatchOutcome, DispatchRecord, DispatchState,
    HealthStatus, InboundMessageEvent, IngestReport, LoggedEvent, LongLivedGrant,
    OutboundMessageRequest, RefreshState, SendReceipt, ShortLivedGrant, TokenKind,
};

pub use traits::{AlertSink, CredentialStore, DispatchLedger, EventLog, PlatformClient, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_credential_store<T: CredentialStore>() {}
        fn _assert_event_log<T: EventLog>() {}
        fn _assert_dispatch_ledger<T: DispatchLedger>() {}
        fn _assert_platform_client<T: PlatformClient>() {}
        fn _assert_alert_sink<T: AlertSink>() {}
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Platform,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), HealthStatus::Healthy);
    }
}
