//! Append-only audit log operations. No update or delete exists on purpose.

use rusqlite::{params, Connection};

use openmemory_core::models::AuditRecord;
use openmemory_core::{OmError, OmResult};

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{rows, ts};
use crate::sql::statements as st;

pub fn insert(conn: &Connection, record: &AuditRecord) -> OmResult<()> {
    let metadata =
        serde_json::to_string(&record.metadata).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::INSERT_AUDIT)
        .map_err(|e| busy_to_storage(e, "insert_audit prepare"))?
        .execute(params![
            record.id,
            record.user_id,
            record.action,
            record.resource_type,
            record.resource_id,
            record.ip,
            record.ua,
            metadata,
            ts(record.timestamp),
        ])
        .map_err(|e| busy_to_storage(e, "insert_audit"))?;
    Ok(())
}

pub fn list_by_user(conn: &Connection, user_id: &str, limit: usize) -> OmResult<Vec<AuditRecord>> {
    let mut stmt = conn
        .prepare_cached(st::LIST_AUDIT_BY_USER)
        .map_err(|e| busy_to_storage(e, "list_audit prepare"))?;
    let mapped = stmt
        .query_map(params![user_id, limit as i64], |row| Ok(rows::audit(row)))
        .map_err(|e| busy_to_storage(e, "list_audit"))?;
    let mut out = Vec::new();
    for rec in mapped {
        out.push(rec.map_err(|e| busy_to_storage(e, "list_audit row"))??);
    }
    Ok(out)
}
