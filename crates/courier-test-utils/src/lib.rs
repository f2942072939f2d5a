// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock collaborators and a temp-database harness for fast,
//! deterministic tests without a real platform.
//!
//! # Components
//!
//! - [`MockPlatform`] - scripted platform client that records every call
//! - [`RecordingAlertSink`] - captures lapsed-credential alerts
//! - [`FlakyEventLog`] - event log wrapper that fails a set number of appends
//! - [`FlakyCredentialStore`] - credential store wrapper that fails a set number of writes
//! - [`TestHarness`] - temp SQLite store wired to the mocks

pub mod alerts;
pub mod flaky;
pub mod harness;
pub mod mock_platform;

pub use alerts::RecordingAlertSink;
pub use flaky::{FlakyCredentialStore, FlakyEventLog};
pub use harness::TestHarness;
pub use mock_platform::MockPlatform;
