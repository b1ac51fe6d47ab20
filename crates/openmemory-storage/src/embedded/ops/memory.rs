//! Memory row CRUD.

use rusqlite::{params, Connection, OptionalExtension};

use openmemory_core::models::MemoryItem;
use openmemory_core::{OmError, OmResult, Sector};

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{rows, ts};
use crate::sql::statements as st;

pub fn insert(conn: &Connection, item: &MemoryItem) -> OmResult<()> {
    let tags = serde_json::to_string(&item.tags).map_err(|e| OmError::storage(e.to_string()))?;
    let metadata =
        serde_json::to_string(&item.metadata).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::INSERT_MEMORY)
        .map_err(|e| busy_to_storage(e, "insert_memory prepare"))?
        .execute(params![
            item.id,
            item.user_id,
            item.content,
            item.content_hash,
            item.primary_sector.as_str(),
            tags,
            metadata,
            ts(item.created_at),
            ts(item.updated_at),
            ts(item.last_accessed_at),
            item.salience,
            item.decay_rate,
            item.version,
            item.key_version as i64,
            item.archived as i64,
        ])
        .map_err(|e| busy_to_storage(e, "insert_memory"))?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> OmResult<Option<MemoryItem>> {
    conn.prepare_cached(st::GET_MEMORY)
        .map_err(|e| busy_to_storage(e, "get_memory prepare"))?
        .query_row(params![id], |row| Ok(rows::memory(row)))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_memory"))?
        .transpose()
}

pub fn get_by_hash(
    conn: &Connection,
    user_id: &str,
    content_hash: &str,
) -> OmResult<Option<MemoryItem>> {
    conn.prepare_cached(st::GET_MEMORY_BY_HASH)
        .map_err(|e| busy_to_storage(e, "get_by_hash prepare"))?
        .query_row(params![user_id, content_hash], |row| Ok(rows::memory(row)))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_by_hash"))?
        .transpose()
}

pub fn list_by_user(
    conn: &Connection,
    user_id: &str,
    sector: Option<Sector>,
    limit: usize,
    offset: usize,
) -> OmResult<Vec<MemoryItem>> {
    let collect = |mut stmt: rusqlite::CachedStatement<'_>,
                   params: &[&dyn rusqlite::ToSql]|
     -> OmResult<Vec<MemoryItem>> {
        let mapped = stmt
            .query_map(params, |row| Ok(rows::memory(row)))
            .map_err(|e| busy_to_storage(e, "list_by_user"))?;
        let mut out = Vec::new();
        for item in mapped {
            out.push(item.map_err(|e| busy_to_storage(e, "list_by_user row"))??);
        }
        Ok(out)
    };

    match sector {
        Some(s) => {
            let stmt = conn
                .prepare_cached(st::LIST_MEMORIES_BY_USER_SECTOR)
                .map_err(|e| busy_to_storage(e, "list_by_user prepare"))?;
            collect(
                stmt,
                &[&user_id, &s.as_str(), &(limit as i64), &(offset as i64)],
            )
        }
        None => {
            let stmt = conn
                .prepare_cached(st::LIST_MEMORIES_BY_USER)
                .map_err(|e| busy_to_storage(e, "list_by_user prepare"))?;
            collect(stmt, &[&user_id, &(limit as i64), &(offset as i64)])
        }
    }
}

pub fn list_recent(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> OmResult<Vec<MemoryItem>> {
    let mut stmt = conn
        .prepare_cached(st::LIST_RECENT_MEMORIES)
        .map_err(|e| busy_to_storage(e, "list_recent prepare"))?;
    let mapped = stmt
        .query_map(params![user_id, 0i64, limit as i64], |row| {
            Ok(rows::memory(row))
        })
        .map_err(|e| busy_to_storage(e, "list_recent"))?;
    let mut out = Vec::new();
    for item in mapped {
        out.push(item.map_err(|e| busy_to_storage(e, "list_recent row"))??);
    }
    Ok(out)
}

/// Returns the number of rows updated; zero means the id/user pair does not
/// exist.
pub fn update(conn: &Connection, item: &MemoryItem) -> OmResult<usize> {
    let tags = serde_json::to_string(&item.tags).map_err(|e| OmError::storage(e.to_string()))?;
    let metadata =
        serde_json::to_string(&item.metadata).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::UPDATE_MEMORY)
        .map_err(|e| busy_to_storage(e, "update_memory prepare"))?
        .execute(params![
            item.content,
            item.content_hash,
            item.primary_sector.as_str(),
            tags,
            metadata,
            ts(item.updated_at),
            ts(item.last_accessed_at),
            item.salience,
            item.decay_rate,
            item.key_version as i64,
            item.archived as i64,
            item.id,
            item.user_id,
        ])
        .map_err(|e| busy_to_storage(e, "update_memory"))
}

pub fn touch(conn: &Connection, id: &str, user_id: &str) -> OmResult<()> {
    conn.prepare_cached(st::TOUCH_MEMORY)
        .map_err(|e| busy_to_storage(e, "touch prepare"))?
        .execute(params![ts(chrono::Utc::now()), id, user_id])
        .map_err(|e| busy_to_storage(e, "touch"))?;
    Ok(())
}

pub fn get_salience(conn: &Connection, id: &str, user_id: &str) -> OmResult<Option<f64>> {
    conn.prepare_cached(st::GET_SALIENCE)
        .map_err(|e| busy_to_storage(e, "get_salience prepare"))?
        .query_row(params![id, user_id], |row| row.get(0))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_salience"))
}

pub fn set_salience(conn: &Connection, id: &str, user_id: &str, salience: f64) -> OmResult<()> {
    conn.prepare_cached(st::SET_SALIENCE)
        .map_err(|e| busy_to_storage(e, "set_salience prepare"))?
        .execute(params![salience, ts(chrono::Utc::now()), id, user_id])
        .map_err(|e| busy_to_storage(e, "set_salience"))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_MEMORY)
        .map_err(|e| busy_to_storage(e, "delete_memory prepare"))?
        .execute(params![id, user_id])
        .map_err(|e| busy_to_storage(e, "delete_memory"))
}

pub fn delete_by_user(conn: &Connection, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_MEMORIES_BY_USER)
        .map_err(|e| busy_to_storage(e, "delete_by_user prepare"))?
        .execute(params![user_id])
        .map_err(|e| busy_to_storage(e, "delete_by_user"))
}

pub fn count_by_user(conn: &Connection, user_id: &str) -> OmResult<i64> {
    conn.prepare_cached(st::COUNT_MEMORIES_BY_USER)
        .map_err(|e| busy_to_storage(e, "count prepare"))?
        .query_row(params![user_id], |row| row.get(0))
        .map_err(|e| busy_to_storage(e, "count"))
}

/// Page of (id, user_id, salience, decay_rate, last_accessed_at) for the
/// decay job, keyed by id cursor.
pub fn scan_for_decay(
    conn: &Connection,
    cursor: &str,
    limit: usize,
) -> OmResult<Vec<(String, String, f64, f64, chrono::DateTime<chrono::Utc>)>> {
    let mut stmt = conn
        .prepare_cached(st::SCAN_MEMORIES_FOR_DECAY)
        .map_err(|e| busy_to_storage(e, "scan_for_decay prepare"))?;
    let mapped = stmt
        .query_map(params![0i64, cursor, limit as i64], |row| {
            let accessed: String = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                accessed,
            ))
        })
        .map_err(|e| busy_to_storage(e, "scan_for_decay"))?;
    let mut out = Vec::new();
    for item in mapped {
        let (id, user, salience, rate, accessed) =
            item.map_err(|e| busy_to_storage(e, "scan_for_decay row"))?;
        out.push((id, user, salience, rate, crate::embedded::parse_ts(&accessed)?));
    }
    Ok(out)
}

pub fn apply_decay(
    conn: &Connection,
    id: &str,
    user_id: &str,
    salience: f64,
    archived: bool,
) -> OmResult<()> {
    conn.prepare_cached(st::APPLY_DECAY)
        .map_err(|e| busy_to_storage(e, "apply_decay prepare"))?
        .execute(params![salience, archived as i64, id, user_id])
        .map_err(|e| busy_to_storage(e, "apply_decay"))?;
    Ok(())
}

/// Page of rows still encrypted with a key older than `target_version`.
pub fn scan_for_key_rotation(
    conn: &Connection,
    target_version: u32,
    cursor: &str,
    limit: usize,
) -> OmResult<Vec<(String, String, String, u32)>> {
    let mut stmt = conn
        .prepare_cached(st::SCAN_FOR_KEY_ROTATION)
        .map_err(|e| busy_to_storage(e, "scan_rotation prepare"))?;
    let mapped = stmt
        .query_map(params![target_version as i64, cursor, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)? as u32,
            ))
        })
        .map_err(|e| busy_to_storage(e, "scan_rotation"))?;
    mapped
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| busy_to_storage(e, "scan_rotation row"))
}

pub fn rewrite_content_key(
    conn: &Connection,
    id: &str,
    user_id: &str,
    ciphertext: &str,
    key_version: u32,
) -> OmResult<()> {
    conn.prepare_cached(st::REWRITE_CONTENT_KEY)
        .map_err(|e| busy_to_storage(e, "rewrite_key prepare"))?
        .execute(params![ciphertext, key_version as i64, id, user_id])
        .map_err(|e| busy_to_storage(e, "rewrite_key"))?;
    Ok(())
}
