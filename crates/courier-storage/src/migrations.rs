// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! every time the database is opened.

use courier_core::CourierError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies all pending migrations. Refinery records applied versions in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), CourierError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(CourierError::store)?;
    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
