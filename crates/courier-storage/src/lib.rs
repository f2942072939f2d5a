// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Courier.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. [`SqliteStore`]
//! implements the credential store, event log, and dispatch ledger traits.
//!
//! All writes go through the one background thread owned by [`Database`];
//! do not open additional connections for writes.

pub mod adapter;
pub mod crypto;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStore;
pub use crypto::TokenCipher;
pub use database::Database;
