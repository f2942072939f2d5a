// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tolerant webhook payload parsing.
//!
//! The payload is read as an untyped JSON tree so that one malformed entry
//! cannot fail its siblings. Only a body that is not a JSON object with an
//! `entry` array is rejected as a whole.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use courier_core::{CourierError, InboundMessageEvent};

/// Events recovered from one payload.
#[derive(Debug, Default)]
pub struct ParsedPayload {
    pub events: Vec<InboundMessageEvent>,
    /// Entries or messaging items dropped as malformed.
    pub skipped: usize,
    /// Messaging items that carry no message (read receipts, reactions).
    pub ignored: usize,
}

pub fn parse_payload(body: &[u8], received_at: DateTime<Utc>) -> Result<ParsedPayload, CourierError> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| CourierError::MalformedPayload(format!("body is not JSON: {e}")))?;
    let root = root
        .as_object()
        .ok_or_else(|| CourierError::MalformedPayload("body is not a JSON object".into()))?;
    let entries = root
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| CourierError::MalformedPayload("missing entry array".into()))?;

    let mut parsed = ParsedPayload::default();
    for (index, entry) in entries.iter().enumerate() {
        let Some(items) = entry.get("messaging").and_then(Value::as_array) else {
            warn!(entry = index, "skipping entry without messaging array");
            parsed.skipped += 1;
            continue;
        };
        for item in items {
            let Some(message) = item.get("message") else {
                parsed.ignored += 1;
                continue;
            };
            match parse_message(item, message, received_at) {
                Ok(event) => parsed.events.push(event),
                Err(reason) => {
                    warn!(entry = index, reason, "skipping malformed messaging item");
                    parsed.skipped += 1;
                }
            }
        }
    }
    debug!(
        events = parsed.events.len(),
        skipped = parsed.skipped,
        ignored = parsed.ignored,
        "payload parsed"
    );
    Ok(parsed)
}

fn parse_message(
    item: &Value,
    message: &Value,
    received_at: DateTime<Utc>,
) -> Result<InboundMessageEvent, &'static str> {
    let platform_event_id = non_empty_str(message.get("mid")).ok_or("missing message.mid")?;
    let sender_id = id_of(item.get("sender")).ok_or("missing sender.id")?;
    let recipient_id = id_of(item.get("recipient")).ok_or("missing recipient.id")?;

    // Text when present; otherwise the raw message object (attachments, stickers).
    let body = match message.get("text").and_then(Value::as_str) {
        Some(text) => text.as_bytes().to_vec(),
        None => serde_json::to_vec(message).map_err(|_| "unserializable message")?,
    };

    Ok(InboundMessageEvent {
        platform_event_id,
        sender_id,
        recipient_id,
        body,
        received_at,
        platform_timestamp: item.get("timestamp").and_then(Value::as_i64),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids arrive as strings but some payloads carry them as numbers.
fn id_of(party: Option<&Value>) -> Option<String> {
    match party?.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
