//! Aggregate counters for the dashboard.

use rusqlite::Connection;

use openmemory_core::OmResult;

use crate::embedded::write_conn::busy_to_storage;
use crate::sql::statements as st;

fn scalar(conn: &Connection, sql: &str) -> OmResult<i64> {
    conn.prepare_cached(sql)
        .map_err(|e| busy_to_storage(e, "stats prepare"))?
        .query_row([], |row| row.get(0))
        .map_err(|e| busy_to_storage(e, "stats"))
}

pub fn count_memories(conn: &Connection) -> OmResult<i64> {
    scalar(conn, st::COUNT_ALL_MEMORIES)
}

pub fn count_users(conn: &Connection) -> OmResult<i64> {
    scalar(conn, st::COUNT_ALL_USERS)
}

pub fn count_facts(conn: &Connection) -> OmResult<i64> {
    scalar(conn, st::COUNT_ALL_FACTS)
}

pub fn count_waypoints(conn: &Connection) -> OmResult<i64> {
    scalar(conn, st::COUNT_ALL_WAYPOINTS)
}

pub fn sector_histogram(conn: &Connection) -> OmResult<Vec<(String, i64)>> {
    let mut stmt = conn
        .prepare_cached(st::SECTOR_HISTOGRAM)
        .map_err(|e| busy_to_storage(e, "histogram prepare"))?;
    let mapped = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| busy_to_storage(e, "histogram"))?;
    mapped
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| busy_to_storage(e, "histogram row"))
}

pub fn avg_salience(conn: &Connection) -> OmResult<f64> {
    conn.prepare_cached(st::AVG_SALIENCE)
        .map_err(|e| busy_to_storage(e, "avg prepare"))?
        .query_row([], |row| row.get::<_, Option<f64>>(0))
        .map(|v| v.unwrap_or(0.0))
        .map_err(|e| busy_to_storage(e, "avg"))
}
