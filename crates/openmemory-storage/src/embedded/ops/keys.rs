//! API key operations.

use chrono::Utc;
use rusqlite::{params, Connection};

use openmemory_core::models::ApiKeyRecord;
use openmemory_core::{OmError, OmResult};

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{rows, ts};
use crate::sql::statements as st;

pub fn insert(conn: &Connection, key: &ApiKeyRecord) -> OmResult<()> {
    let scopes =
        serde_json::to_string(&key.scopes).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::INSERT_API_KEY)
        .map_err(|e| busy_to_storage(e, "insert_key prepare"))?
        .execute(params![
            key.hash,
            key.user_id,
            scopes,
            ts(key.created_at),
            key.last_used_at.map(ts),
            key.disabled as i64,
        ])
        .map_err(|e| busy_to_storage(e, "insert_key"))?;
    Ok(())
}

pub fn list_by_user(conn: &Connection, user_id: &str) -> OmResult<Vec<ApiKeyRecord>> {
    let mut stmt = conn
        .prepare_cached(st::LIST_API_KEYS)
        .map_err(|e| busy_to_storage(e, "list_keys prepare"))?;
    let mapped = stmt
        .query_map(params![user_id], |row| Ok(rows::api_key(row)))
        .map_err(|e| busy_to_storage(e, "list_keys"))?;
    let mut out = Vec::new();
    for key in mapped {
        out.push(key.map_err(|e| busy_to_storage(e, "list_keys row"))??);
    }
    Ok(out)
}

/// Every enabled key. Verification hashes the presented plaintext against
/// each candidate, so the working set is expected to stay small.
pub fn list_enabled(conn: &Connection) -> OmResult<Vec<ApiKeyRecord>> {
    let mut stmt = conn
        .prepare_cached(st::LIST_ALL_API_KEYS)
        .map_err(|e| busy_to_storage(e, "list_enabled prepare"))?;
    let mapped = stmt
        .query_map(params![0i64], |row| Ok(rows::api_key(row)))
        .map_err(|e| busy_to_storage(e, "list_enabled"))?;
    let mut out = Vec::new();
    for key in mapped {
        out.push(key.map_err(|e| busy_to_storage(e, "list_enabled row"))??);
    }
    Ok(out)
}

pub fn touch(conn: &Connection, hash: &str) -> OmResult<()> {
    conn.prepare_cached(st::TOUCH_API_KEY)
        .map_err(|e| busy_to_storage(e, "touch_key prepare"))?
        .execute(params![ts(Utc::now()), hash])
        .map_err(|e| busy_to_storage(e, "touch_key"))?;
    Ok(())
}

pub fn disable(conn: &Connection, hash: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DISABLE_API_KEY)
        .map_err(|e| busy_to_storage(e, "disable_key prepare"))?
        .execute(params![1i64, hash])
        .map_err(|e| busy_to_storage(e, "disable_key"))
}
