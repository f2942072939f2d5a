// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch ledger.

use chrono::Utc;
use courier_core::{CourierError, DispatchRecord, DispatchState, OutboundMessageRequest};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{from_millis, parse_enum, to_millis};

const COLUMNS: &str = "idempotency_key, subject_id, recipient_id, body, state, attempts,
     platform_message_id, last_error, created_at, updated_at";

fn read_row(row: &Row<'_>) -> Result<DispatchRecord, rusqlite::Error> {
    Ok(DispatchRecord {
        idempotency_key: row.get(0)?,
        subject_id: row.get(1)?,
        recipient_id: row.get(2)?,
        body: row.get(3)?,
        state: parse_enum(4, row.get(4)?)?,
        attempts: row.get(5)?,
        platform_message_id: row.get(6)?,
        last_error: row.get(7)?,
        created_at: from_millis(8, row.get(8)?)?,
        updated_at: from_millis(9, row.get(9)?)?,
    })
}

fn select(conn: &Connection, key: &str) -> Result<Option<DispatchRecord>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM dispatches WHERE idempotency_key = ?1"),
        params![key],
        read_row,
    )
    .optional()
}

/// Inserts a `pending` record unless one exists, then returns the stored row.
///
/// Runs in one transaction so concurrent callers with the same key observe a
/// single record.
pub async fn begin(
    db: &Database,
    request: &OutboundMessageRequest,
) -> Result<DispatchRecord, CourierError> {
    let request = request.clone();
    db.connection()
        .call(move |conn| -> Result<DispatchRecord, rusqlite::Error> {
            let tx = conn.transaction()?;
            let now = to_millis(Utc::now());
            tx.execute(
                "INSERT OR IGNORE INTO dispatches
                     (idempotency_key, subject_id, recipient_id, body, state, attempts,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                params![
                    request.idempotency_key,
                    request.subject_id,
                    request.recipient_id,
                    request.body,
                    DispatchState::Pending.to_string(),
                    now,
                ],
            )?;
            let record = select(&tx, &request.idempotency_key)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

/// Increments `attempts` and returns the new value.
pub async fn record_attempt(db: &Database, key: &str) -> Result<u32, CourierError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<u32, rusqlite::Error> {
            conn.query_row(
                "UPDATE dispatches SET attempts = attempts + 1, updated_at = ?2
                 WHERE idempotency_key = ?1
                 RETURNING attempts",
                params![key, to_millis(Utc::now())],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Moves a record to a terminal state. A record that is already terminal is
/// left untouched and returned as stored.
pub async fn complete(
    db: &Database,
    key: &str,
    state: DispatchState,
    platform_message_id: Option<&str>,
    error: Option<&str>,
) -> Result<DispatchRecord, CourierError> {
    let key = key.to_string();
    let platform_message_id = platform_message_id.map(str::to_string);
    let error = error.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<DispatchRecord, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE dispatches
                 SET state = ?2, platform_message_id = ?3, last_error = ?4, updated_at = ?5
                 WHERE idempotency_key = ?1 AND state = 'pending'",
                params![
                    key,
                    state.to_string(),
                    platform_message_id,
                    error,
                    to_millis(Utc::now()),
                ],
            )?;
            let record = select(&tx, &key)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, key: &str) -> Result<Option<DispatchRecord>, CourierError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DispatchRecord>, rusqlite::Error> { select(conn, &key) })
        .await
        .map_err(map_tr_err)
}
