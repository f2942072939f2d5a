// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message dispatch.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
