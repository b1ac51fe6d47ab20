//! Fixed-window rate-limit counters.

use rusqlite::{params, Connection};

use openmemory_core::OmResult;

use crate::embedded::write_conn::busy_to_storage;
use crate::sql::statements as st;

/// Increment the counter for (key, window_start) and return the new count.
pub fn bump(conn: &Connection, key: &str, window_start: i64) -> OmResult<i64> {
    conn.prepare_cached(st::RATE_LIMIT_BUMP)
        .map_err(|e| busy_to_storage(e, "rate_bump prepare"))?
        .query_row(params![key, window_start], |row| row.get(0))
        .map_err(|e| busy_to_storage(e, "rate_bump"))
}

/// Drop windows older than the horizon. Called by compaction.
pub fn prune(conn: &Connection, horizon: i64) -> OmResult<usize> {
    conn.prepare_cached(st::PRUNE_RATE_WINDOWS)
        .map_err(|e| busy_to_storage(e, "rate_prune prepare"))?
        .execute(params![horizon])
        .map_err(|e| busy_to_storage(e, "rate_prune"))
}
