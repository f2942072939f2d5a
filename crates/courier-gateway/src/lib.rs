// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Courier.
//!
//! Public routes: webhook handshake and delivery, the OAuth callback, health
//! and metrics. Everything under `/v1` requires the configured bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{AppState, HealthState, build_router, start_server};
