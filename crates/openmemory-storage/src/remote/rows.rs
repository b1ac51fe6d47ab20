//! Row-to-model mappers for the remote backend.

use std::collections::BTreeSet;

use tokio_postgres::Row;

use openmemory_core::models::{
    ApiKeyRecord, AuditRecord, MemoryItem, TemporalFact, VectorRecord, Waypoint,
};
use openmemory_core::{OmError, OmResult, Sector};

use crate::embedded::rows::bytes_to_f32;

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> OmResult<T> {
    row.try_get(idx)
        .map_err(|e| OmError::storage(format!("column {idx}: {e}")))
}

fn json_map(value: serde_json::Value) -> OmResult<serde_json::Map<String, serde_json::Value>> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(OmError::storage(format!("expected object metadata, got {other}"))),
    }
}

pub fn memory(row: &Row) -> OmResult<MemoryItem> {
    let sector_str: String = get(row, 4)?;
    let tags_value: serde_json::Value = get(row, 5)?;
    let tags: BTreeSet<String> = serde_json::from_value(tags_value)
        .map_err(|e| OmError::storage(format!("parse tags: {e}")))?;

    Ok(MemoryItem {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        content: get(row, 2)?,
        content_hash: get(row, 3)?,
        primary_sector: Sector::parse(&sector_str)?,
        tags,
        metadata: json_map(get(row, 6)?)?,
        created_at: get(row, 7)?,
        updated_at: get(row, 8)?,
        last_accessed_at: get(row, 9)?,
        salience: get(row, 10)?,
        decay_rate: get(row, 11)?,
        version: get(row, 12)?,
        key_version: get::<i32>(row, 13)? as u32,
        archived: get(row, 14)?,
    })
}

pub fn vector(row: &Row) -> OmResult<VectorRecord> {
    let sector_str: String = get(row, 1)?;
    let blob: Vec<u8> = get(row, 3)?;
    let dim: i32 = get(row, 4)?;
    Ok(VectorRecord {
        memory_id: get(row, 0)?,
        sector: Sector::parse(&sector_str)?,
        user_id: get(row, 2)?,
        payload: bytes_to_f32(&blob),
        dim: dim as usize,
    })
}

pub fn waypoint(row: &Row) -> OmResult<Waypoint> {
    Ok(Waypoint {
        src_id: get(row, 0)?,
        dst_id: get(row, 1)?,
        user_id: get(row, 2)?,
        weight: get(row, 3)?,
        created_at: get(row, 4)?,
        updated_at: get(row, 5)?,
    })
}

pub fn fact(row: &Row) -> OmResult<TemporalFact> {
    Ok(TemporalFact {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        subject: get(row, 2)?,
        predicate: get(row, 3)?,
        object: get(row, 4)?,
        valid_from: get(row, 5)?,
        valid_to: get(row, 6)?,
        confidence: get(row, 7)?,
        last_updated: get(row, 8)?,
        metadata: json_map(get(row, 9)?)?,
    })
}

pub fn audit(row: &Row) -> OmResult<AuditRecord> {
    Ok(AuditRecord {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        action: get(row, 2)?,
        resource_type: get(row, 3)?,
        resource_id: get(row, 4)?,
        ip: get(row, 5)?,
        ua: get(row, 6)?,
        metadata: get(row, 7)?,
        timestamp: get(row, 8)?,
    })
}

pub fn api_key(row: &Row) -> OmResult<ApiKeyRecord> {
    let scopes_value: serde_json::Value = get(row, 2)?;
    Ok(ApiKeyRecord {
        hash: get(row, 0)?,
        user_id: get(row, 1)?,
        scopes: serde_json::from_value(scopes_value)
            .map_err(|e| OmError::storage(format!("parse scopes: {e}")))?,
        created_at: get(row, 3)?,
        last_used_at: get(row, 4)?,
        disabled: get(row, 5)?,
    })
}
