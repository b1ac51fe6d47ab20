//! Vector row operations.

use rusqlite::{params, Connection, OptionalExtension};

use openmemory_core::models::VectorRecord;
use openmemory_core::{OmResult, Sector};

use crate::embedded::rows::{self, f32_to_bytes};
use crate::embedded::write_conn::busy_to_storage;
use crate::sql::statements as st;

pub fn insert(conn: &Connection, record: &VectorRecord) -> OmResult<()> {
    conn.prepare_cached(st::INSERT_VECTOR)
        .map_err(|e| busy_to_storage(e, "insert_vector prepare"))?
        .execute(params![
            record.memory_id,
            record.sector.as_str(),
            record.user_id,
            f32_to_bytes(&record.payload),
            record.dim as i64,
        ])
        .map_err(|e| busy_to_storage(e, "insert_vector"))?;
    Ok(())
}

pub fn get(
    conn: &Connection,
    memory_id: &str,
    sector: Sector,
    user_id: &str,
) -> OmResult<Option<VectorRecord>> {
    conn.prepare_cached(st::GET_VECTOR)
        .map_err(|e| busy_to_storage(e, "get_vector prepare"))?
        .query_row(params![memory_id, sector.as_str(), user_id], |row| {
            Ok(rows::vector(row))
        })
        .optional()
        .map_err(|e| busy_to_storage(e, "get_vector"))?
        .transpose()
}

/// Batch lookup by memory id. Missing ids are skipped, matching the
/// missing-row-is-not-an-error contract.
pub fn batch_get(
    conn: &Connection,
    memory_ids: &[String],
    user_id: &str,
) -> OmResult<Vec<VectorRecord>> {
    let mut stmt = conn
        .prepare_cached(st::GET_VECTORS_BY_MEMORY)
        .map_err(|e| busy_to_storage(e, "batch_get prepare"))?;
    let mut out = Vec::with_capacity(memory_ids.len());
    for id in memory_ids {
        let mapped = stmt
            .query_map(params![id, user_id], |row| Ok(rows::vector(row)))
            .map_err(|e| busy_to_storage(e, "batch_get"))?;
        for rec in mapped {
            out.push(rec.map_err(|e| busy_to_storage(e, "batch_get row"))??);
        }
    }
    Ok(out)
}

/// Cursor-paged scan of one user's vectors in a sector. Returns the page and
/// the cursor to resume from (last memory_id), if the page was full.
pub fn scan_by_sector(
    conn: &Connection,
    user_id: &str,
    sector: Sector,
    cursor: &str,
    limit: usize,
) -> OmResult<(Vec<VectorRecord>, Option<String>)> {
    let mut stmt = conn
        .prepare_cached(st::SCAN_VECTORS_BY_SECTOR)
        .map_err(|e| busy_to_storage(e, "scan_vectors prepare"))?;
    let mapped = stmt
        .query_map(params![user_id, sector.as_str(), cursor, limit as i64], |row| {
            Ok(rows::vector(row))
        })
        .map_err(|e| busy_to_storage(e, "scan_vectors"))?;
    let mut page = Vec::new();
    for rec in mapped {
        page.push(rec.map_err(|e| busy_to_storage(e, "scan_vectors row"))??);
    }
    let next = if page.len() == limit {
        page.last().map(|r| r.memory_id.clone())
    } else {
        None
    };
    Ok((page, next))
}

pub fn delete_by_memory(conn: &Connection, memory_id: &str, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_VECTORS_BY_MEMORY)
        .map_err(|e| busy_to_storage(e, "delete_vectors prepare"))?
        .execute(params![memory_id, user_id])
        .map_err(|e| busy_to_storage(e, "delete_vectors"))
}

pub fn delete_by_user(conn: &Connection, user_id: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_VECTORS_BY_USER)
        .map_err(|e| busy_to_storage(e, "delete_vectors_by_user prepare"))?
        .execute(params![user_id])
        .map_err(|e| busy_to_storage(e, "delete_vectors_by_user"))
}
