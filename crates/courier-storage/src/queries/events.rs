// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only inbound event log.

use courier_core::{AppendOutcome, CourierError, InboundMessageEvent, LoggedEvent};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{from_millis, to_millis};

pub async fn exists_by_id(db: &Database, platform_event_id: &str) -> Result<bool, CourierError> {
    let id = platform_event_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM events WHERE platform_event_id = ?1)",
                params![id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// `INSERT OR IGNORE` on the unique event id. A redelivered event changes
/// nothing and reports [`AppendOutcome::Duplicate`].
pub async fn append(
    db: &Database,
    event: &InboundMessageEvent,
) -> Result<AppendOutcome, CourierError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| -> Result<AppendOutcome, rusqlite::Error> {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO events
                     (platform_event_id, sender_id, recipient_id, body, received_at, platform_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.platform_event_id,
                    event.sender_id,
                    event.recipient_id,
                    event.body,
                    to_millis(event.received_at),
                    event.platform_timestamp,
                ],
            )?;
            Ok(if inserted == 1 {
                AppendOutcome::Inserted
            } else {
                AppendOutcome::Duplicate
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Events with `sequence > after`, oldest first.
pub async fn read_after(
    db: &Database,
    after: i64,
    limit: usize,
) -> Result<Vec<LoggedEvent>, CourierError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<LoggedEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT sequence, platform_event_id, sender_id, recipient_id, body,
                        received_at, platform_timestamp
                 FROM events WHERE sequence > ?1 ORDER BY sequence ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![after, limit], |row| {
                Ok(LoggedEvent {
                    sequence: row.get(0)?,
                    event: InboundMessageEvent {
                        platform_event_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        recipient_id: row.get(3)?,
                        body: row.get(4)?,
                        received_at: from_millis(5, row.get(5)?)?,
                        platform_timestamp: row.get(6)?,
                    },
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<u64, CourierError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: &str, text: &str) -> InboundMessageEvent {
        InboundMessageEvent {
            platform_event_id: id.to_string(),
            sender_id: "sender".into(),
            recipient_id: "page".into(),
            body: text.as_bytes().to_vec(),
            received_at: Utc::now(),
            platform_timestamp: Some(1_700_000_000_000),
        }
    }

    #[tokio::test]
    async fn same_event_id_is_stored_once() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(
            append(&db, &event("evt-1", "hi")).await.unwrap(),
            AppendOutcome::Inserted
        );
        assert_eq!(
            append(&db, &event("evt-1", "hi again")).await.unwrap(),
            AppendOutcome::Duplicate
        );
        assert_eq!(count(&db).await.unwrap(), 1);
        assert!(exists_by_id(&db, "evt-1").await.unwrap());
        assert!(!exists_by_id(&db, "evt-2").await.unwrap());

        let logged = read_after(&db, 0, 10).await.unwrap();
        assert_eq!(logged[0].event.body_text(), "hi");
    }

    #[tokio::test]
    async fn read_after_pages_in_arrival_order() {
        let db = Database::open_in_memory().await.unwrap();
        for id in ["a", "b", "c"] {
            append(&db, &event(id, id)).await.unwrap();
        }
        let first = read_after(&db, 0, 2).await.unwrap();
        let ids: Vec<_> = first
            .iter()
            .map(|e| e.event.platform_event_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let rest = read_after(&db, first[1].sequence, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].event.platform_event_id, "c");
        assert_eq!(rest[0].event.platform_timestamp, Some(1_700_000_000_000));
    }
}
