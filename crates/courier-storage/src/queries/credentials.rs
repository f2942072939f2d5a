// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential rows, one per subject.

use chrono::{DateTime, Utc};
use courier_core::{CourierError, RefreshState};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{CredentialRow, from_millis, parse_enum, to_millis};

const COLUMNS: &str = "subject_id, access_token, token_nonce, token_kind, issued_at, expires_at,
     refresh_state, refresh_attempts, next_refresh_at, last_error";

fn read_row(row: &Row<'_>) -> Result<CredentialRow, rusqlite::Error> {
    let next_refresh_at: Option<i64> = row.get(8)?;
    Ok(CredentialRow {
        subject_id: row.get(0)?,
        token: row.get(1)?,
        nonce: row.get(2)?,
        token_kind: parse_enum(3, row.get(3)?)?,
        issued_at: from_millis(4, row.get(4)?)?,
        expires_at: from_millis(5, row.get(5)?)?,
        refresh_state: parse_enum(6, row.get(6)?)?,
        refresh_attempts: row.get(7)?,
        next_refresh_at: next_refresh_at.map(|ms| from_millis(8, ms)).transpose()?,
        last_error: row.get(9)?,
    })
}

pub async fn get(db: &Database, subject_id: &str) -> Result<Option<CredentialRow>, CourierError> {
    let subject_id = subject_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<CredentialRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM credentials WHERE subject_id = ?1"),
                params![subject_id],
                read_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts or fully replaces the row for `row.subject_id`.
pub async fn upsert(db: &Database, row: CredentialRow) -> Result<(), CourierError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO credentials (subject_id, access_token, token_nonce, token_kind,
                     issued_at, expires_at, refresh_state, refresh_attempts, next_refresh_at,
                     last_error, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(subject_id) DO UPDATE SET
                     access_token = excluded.access_token,
                     token_nonce = excluded.token_nonce,
                     token_kind = excluded.token_kind,
                     issued_at = excluded.issued_at,
                     expires_at = excluded.expires_at,
                     refresh_state = excluded.refresh_state,
                     refresh_attempts = excluded.refresh_attempts,
                     next_refresh_at = excluded.next_refresh_at,
                     last_error = excluded.last_error,
                     updated_at = excluded.updated_at",
                params![
                    row.subject_id,
                    row.token,
                    row.nonce,
                    row.token_kind.to_string(),
                    to_millis(row.issued_at),
                    to_millis(row.expires_at),
                    row.refresh_state.to_string(),
                    row.refresh_attempts,
                    row.next_refresh_at.map(to_millis),
                    row.last_error,
                    to_millis(Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Rows expiring strictly before `cutoff`, soonest first.
pub async fn list_expiring_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<CredentialRow>, CourierError> {
    let cutoff = to_millis(cutoff);
    db.connection()
        .call(move |conn| -> Result<Vec<CredentialRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM credentials WHERE expires_at < ?1 ORDER BY expires_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], read_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_by_state(
    db: &Database,
    state: RefreshState,
) -> Result<Vec<CredentialRow>, CourierError> {
    let state = state.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<CredentialRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM credentials WHERE refresh_state = ?1 ORDER BY subject_id"
            ))?;
            let rows = stmt.query_map(params![state], read_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, subject_id: &str) -> Result<bool, CourierError> {
    let subject_id = subject_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "DELETE FROM credentials WHERE subject_id = ?1",
                params![subject_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_by_state(db: &Database, state: RefreshState) -> Result<u64, CourierError> {
    let state = state.to_string();
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM credentials WHERE refresh_state = ?1",
                params![state],
                |row| row.get(0),
            )?;
            Ok(n.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use courier_core::Credential;

    fn row(subject: &str, expires_in_days: i64) -> CredentialRow {
        let cred = Credential::long_lived(
            subject,
            format!("tok-{subject}"),
            Utc::now(),
            Duration::days(expires_in_days),
        );
        CredentialRow::seal(&cred, None).unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let db = Database::open_in_memory().await.unwrap();
        upsert(&db, row("u1", 60)).await.unwrap();
        let mut second = row("u1", 30);
        second.token = b"tok-new".to_vec();
        upsert(&db, second).await.unwrap();

        let stored = get(&db, "u1").await.unwrap().unwrap();
        assert_eq!(stored.token, b"tok-new");
        let all = list_expiring_before(&db, Utc::now() + Duration::days(365))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn expiring_rows_are_ordered_and_bounded() {
        let db = Database::open_in_memory().await.unwrap();
        upsert(&db, row("late", 50)).await.unwrap();
        upsert(&db, row("soon", 5)).await.unwrap();
        upsert(&db, row("never", 90)).await.unwrap();

        let rows = list_expiring_before(&db, Utc::now() + Duration::days(60))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "late"]);
    }

    #[tokio::test]
    async fn state_filters_and_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let mut failed = row("u1", 10);
        failed.refresh_state = RefreshState::RefreshFailed;
        failed.refresh_attempts = 5;
        failed.next_refresh_at = Some(Utc::now());
        upsert(&db, failed).await.unwrap();
        upsert(&db, row("u2", 10)).await.unwrap();

        let lapsed = list_by_state(&db, RefreshState::RefreshFailed).await.unwrap();
        assert_eq!(lapsed.len(), 1);
        assert_eq!(lapsed[0].refresh_attempts, 5);
        assert!(lapsed[0].next_refresh_at.is_some());
        assert_eq!(count_by_state(&db, RefreshState::Fresh).await.unwrap(), 1);

        assert!(delete(&db, "u1").await.unwrap());
        assert!(!delete(&db, "u1").await.unwrap());
        assert!(get(&db, "u1").await.unwrap().is_none());
    }
}
