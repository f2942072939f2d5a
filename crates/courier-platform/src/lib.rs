// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform egress for Courier.
//!
//! [`GraphClient`] implements [`courier_core::PlatformClient`] over reqwest:
//! authorization code exchange, long-lived upgrade, refresh, and message send.

pub mod client;
pub mod types;

pub use client::GraphClient;
