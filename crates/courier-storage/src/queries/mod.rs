// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions. Each takes `&Database` and runs on the single
//! writer thread through `Connection::call`.

pub mod credentials;
pub mod dispatches;
pub mod events;
