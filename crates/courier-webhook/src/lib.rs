// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook pipeline: authenticate, parse, deduplicate, persist.

pub mod handler;
pub mod handshake;
pub mod payload;
pub mod signature;

pub use handler::IngestionHandler;
pub use handshake::HandshakeParams;
pub use payload::{ParsedPayload, parse_payload};
pub use signature::{SIGNATURE_HEADER, SignatureVerifier};
