//! User row operations: summary and reflection bookkeeping.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use openmemory_core::OmResult;

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{parse_ts, ts};
use crate::sql::statements as st;

/// A user's soft profile row.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub summary: Option<String>,
    pub reflection_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> OmResult<UserRow> {
    let created: String = row
        .get(3)
        .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?;
    let seen: String = row
        .get(4)
        .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?;
    Ok(UserRow {
        user_id: row
            .get(0)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        summary: row
            .get(1)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        reflection_count: row
            .get(2)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        created_at: parse_ts(&created)?,
        last_seen_at: parse_ts(&seen)?,
    })
}

/// Created on first access; subsequent calls only refresh last_seen_at.
pub fn upsert_seen(conn: &Connection, user_id: &str) -> OmResult<()> {
    let now = ts(Utc::now());
    conn.prepare_cached(st::UPSERT_USER)
        .map_err(|e| busy_to_storage(e, "upsert_user prepare"))?
        .execute(params![user_id, now, now])
        .map_err(|e| busy_to_storage(e, "upsert_user"))?;
    Ok(())
}

pub fn get(conn: &Connection, user_id: &str) -> OmResult<Option<UserRow>> {
    conn.prepare_cached(st::GET_USER)
        .map_err(|e| busy_to_storage(e, "get_user prepare"))?
        .query_row(params![user_id], |row| Ok(row_to_user(row)))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_user"))?
        .transpose()
}

pub fn list(conn: &Connection, limit: usize, offset: usize) -> OmResult<Vec<UserRow>> {
    let mut stmt = conn
        .prepare_cached(st::LIST_USERS)
        .map_err(|e| busy_to_storage(e, "list_users prepare"))?;
    let mapped = stmt
        .query_map(params![limit as i64, offset as i64], |row| {
            Ok(row_to_user(row))
        })
        .map_err(|e| busy_to_storage(e, "list_users"))?;
    let mut out = Vec::new();
    for user in mapped {
        out.push(user.map_err(|e| busy_to_storage(e, "list_users row"))??);
    }
    Ok(out)
}

/// Store a reflection summary and bump the counter in one statement.
pub fn set_summary(conn: &Connection, user_id: &str, summary: &str) -> OmResult<()> {
    conn.prepare_cached(st::SET_USER_SUMMARY)
        .map_err(|e| busy_to_storage(e, "set_summary prepare"))?
        .execute(params![summary, user_id])
        .map_err(|e| busy_to_storage(e, "set_summary"))?;
    Ok(())
}

pub fn delete(conn: &Connection, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_USER)
        .map_err(|e| busy_to_storage(e, "delete_user prepare"))?
        .execute(params![user_id])
        .map_err(|e| busy_to_storage(e, "delete_user"))
}
