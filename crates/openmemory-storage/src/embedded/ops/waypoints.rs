//! Waypoint edge operations.

use rusqlite::{params, Connection, OptionalExtension};

use openmemory_core::models::Waypoint;
use openmemory_core::OmResult;

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{rows, ts};
use crate::sql::statements as st;

pub fn upsert(conn: &Connection, wp: &Waypoint) -> OmResult<()> {
    conn.prepare_cached(st::UPSERT_WAYPOINT)
        .map_err(|e| busy_to_storage(e, "upsert_waypoint prepare"))?
        .execute(params![
            wp.src_id,
            wp.dst_id,
            wp.user_id,
            wp.weight,
            ts(wp.created_at),
            ts(wp.updated_at),
        ])
        .map_err(|e| busy_to_storage(e, "upsert_waypoint"))?;
    Ok(())
}

pub fn neighbors_of(
    conn: &Connection,
    src_id: &str,
    user_id: &str,
    limit: usize,
) -> OmResult<Vec<Waypoint>> {
    let mut stmt = conn
        .prepare_cached(st::NEIGHBORS_OF)
        .map_err(|e| busy_to_storage(e, "neighbors prepare"))?;
    let mapped = stmt
        .query_map(params![src_id, user_id, limit as i64], |row| {
            Ok(rows::waypoint(row))
        })
        .map_err(|e| busy_to_storage(e, "neighbors"))?;
    let mut out = Vec::new();
    for wp in mapped {
        out.push(wp.map_err(|e| busy_to_storage(e, "neighbors row"))??);
    }
    Ok(out)
}

pub fn get_weight(
    conn: &Connection,
    src_id: &str,
    dst_id: &str,
    user_id: &str,
) -> OmResult<Option<f64>> {
    conn.prepare_cached(st::GET_WAYPOINT_WEIGHT)
        .map_err(|e| busy_to_storage(e, "get_weight prepare"))?
        .query_row(params![src_id, dst_id, user_id], |row| row.get(0))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_weight"))
}

pub fn set_weight(
    conn: &Connection,
    src_id: &str,
    dst_id: &str,
    user_id: &str,
    weight: f64,
) -> OmResult<()> {
    conn.prepare_cached(st::SET_WAYPOINT_WEIGHT)
        .map_err(|e| busy_to_storage(e, "set_weight prepare"))?
        .execute(params![weight, ts(chrono::Utc::now()), src_id, dst_id, user_id])
        .map_err(|e| busy_to_storage(e, "set_weight"))?;
    Ok(())
}

pub fn decay_all(conn: &Connection, factor: f64, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DECAY_WAYPOINTS)
        .map_err(|e| busy_to_storage(e, "decay_waypoints prepare"))?
        .execute(params![factor, user_id])
        .map_err(|e| busy_to_storage(e, "decay_waypoints"))
}

pub fn delete_for_memory(conn: &Connection, memory_id: &str, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_WAYPOINTS_FOR_MEMORY)
        .map_err(|e| busy_to_storage(e, "delete_waypoints prepare"))?
        .execute(params![memory_id, memory_id, user_id])
        .map_err(|e| busy_to_storage(e, "delete_waypoints"))
}

pub fn delete_by_user(conn: &Connection, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_WAYPOINTS_BY_USER)
        .map_err(|e| busy_to_storage(e, "delete_waypoints_by_user prepare"))?
        .execute(params![user_id])
        .map_err(|e| busy_to_storage(e, "delete_waypoints_by_user"))
}

/// Remove edges whose endpoints no longer exist. Used by compaction.
pub fn delete_dangling(conn: &Connection) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_DANGLING_WAYPOINTS)
        .map_err(|e| busy_to_storage(e, "delete_dangling prepare"))?
        .execute(params![])
        .map_err(|e| busy_to_storage(e, "delete_dangling"))
}
