// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the Courier core and its collaborators.
//!
//! Stores, the platform client, and the alert sink are all consumed through
//! these traits as `Arc<dyn Trait>`, using `#[async_trait]` for dynamic
//! dispatch compatibility.

pub mod adapter;
pub mod alert;
pub mod platform;
pub mod store;

pub use adapter::PluginAdapter;
pub use alert::AlertSink;
pub use platform::PlatformClient;
pub use store::{CredentialStore, DispatchLedger, EventLog};
