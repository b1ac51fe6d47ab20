//! PRAGMA configuration applied to every embedded connection.
//!
//! WAL mode, NORMAL sync, 64MB cache, 5s busy_timeout, foreign_keys ON.

use rusqlite::Connection;

use openmemory_core::OmResult;

use super::map_sqlite_err;

/// Apply write-side pragmas.
pub fn apply_pragmas(conn: &Connection) -> OmResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| map_sqlite_err(e, "apply pragmas"))?;
    Ok(())
}

/// Read connections skip the journal-mode switch (read-only handles cannot
/// change it) but keep the timeout and cache settings.
pub fn apply_read_pragmas(conn: &Connection) -> OmResult<()> {
    conn.execute_batch(
        "
        PRAGMA cache_size = -16000;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .map_err(|e| map_sqlite_err(e, "apply read pragmas"))?;
    Ok(())
}

/// Verify that WAL journaling is active.
pub fn verify_wal_mode(conn: &Connection) -> OmResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| map_sqlite_err(e, "query journal_mode"))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
