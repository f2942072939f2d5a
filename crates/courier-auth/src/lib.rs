// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential lifecycle management.
//!
//! - [`TokenExchange`] turns a one-time authorization code into a persisted
//!   long-lived credential.
//! - [`RefreshScheduler`] renews long-lived credentials before they expire.
//!
//! Both serialize credential mutation per subject through a shared
//! [`courier_core::KeyedLocks`], so an exchange racing a refresh is
//! last-writer-wins and never interleaves.

pub mod alert;
pub mod exchange;
pub mod policy;
pub mod scheduler;

pub use alert::TracingAlertSink;
pub use exchange::TokenExchange;
pub use policy::RefreshPolicy;
pub use scheduler::{PassReport, RefreshScheduler, RenewalOutcome};
