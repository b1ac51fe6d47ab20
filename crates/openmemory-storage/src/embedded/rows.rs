//! Row-to-model mappers for the embedded backend.
//!
//! Memory rows traffic in storage encoding: `content` holds base64
//! ciphertext until the store decrypts it.

use std::collections::BTreeSet;

use rusqlite::Row;

use openmemory_core::models::{
    ApiKeyRecord, AuditRecord, MemoryItem, TemporalFact, VectorRecord, Waypoint,
};
use openmemory_core::{OmError, OmResult, Sector};

use super::parse_ts;

fn get<T: rusqlite::types::FromSql>(row: &Row<'_>, idx: usize) -> OmResult<T> {
    row.get(idx)
        .map_err(|e| OmError::storage(format!("column {idx}: {e}")))
}

fn json_map(raw: String) -> OmResult<serde_json::Map<String, serde_json::Value>> {
    serde_json::from_str(&raw).map_err(|e| OmError::storage(format!("parse metadata: {e}")))
}

pub fn memory(row: &Row<'_>) -> OmResult<MemoryItem> {
    let sector_str: String = get(row, 4)?;
    let tags_json: String = get(row, 5)?;
    let created: String = get(row, 7)?;
    let updated: String = get(row, 8)?;
    let accessed: String = get(row, 9)?;
    let tags: BTreeSet<String> =
        serde_json::from_str(&tags_json).map_err(|e| OmError::storage(format!("parse tags: {e}")))?;

    Ok(MemoryItem {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        content: get(row, 2)?,
        content_hash: get(row, 3)?,
        primary_sector: Sector::parse(&sector_str)?,
        tags,
        metadata: json_map(get(row, 6)?)?,
        created_at: parse_ts(&created)?,
        updated_at: parse_ts(&updated)?,
        last_accessed_at: parse_ts(&accessed)?,
        salience: get(row, 10)?,
        decay_rate: get(row, 11)?,
        version: get(row, 12)?,
        key_version: get::<i64>(row, 13)? as u32,
        archived: get::<i64>(row, 14)? != 0,
    })
}

pub fn vector(row: &Row<'_>) -> OmResult<VectorRecord> {
    let sector_str: String = get(row, 1)?;
    let blob: Vec<u8> = get(row, 3)?;
    let dim: i64 = get(row, 4)?;
    Ok(VectorRecord {
        memory_id: get(row, 0)?,
        sector: Sector::parse(&sector_str)?,
        user_id: get(row, 2)?,
        payload: bytes_to_f32(&blob),
        dim: dim as usize,
    })
}

pub fn waypoint(row: &Row<'_>) -> OmResult<Waypoint> {
    let created: String = get(row, 4)?;
    let updated: String = get(row, 5)?;
    Ok(Waypoint {
        src_id: get(row, 0)?,
        dst_id: get(row, 1)?,
        user_id: get(row, 2)?,
        weight: get(row, 3)?,
        created_at: parse_ts(&created)?,
        updated_at: parse_ts(&updated)?,
    })
}

pub fn fact(row: &Row<'_>) -> OmResult<TemporalFact> {
    let valid_from: String = get(row, 5)?;
    let valid_to: Option<String> = get(row, 6)?;
    let last_updated: String = get(row, 8)?;
    Ok(TemporalFact {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        subject: get(row, 2)?,
        predicate: get(row, 3)?,
        object: get(row, 4)?,
        valid_from: parse_ts(&valid_from)?,
        valid_to: valid_to.as_deref().map(parse_ts).transpose()?,
        confidence: get(row, 7)?,
        last_updated: parse_ts(&last_updated)?,
        metadata: json_map(get(row, 9)?)?,
    })
}

pub fn audit(row: &Row<'_>) -> OmResult<AuditRecord> {
    let metadata_json: String = get(row, 7)?;
    let timestamp: String = get(row, 8)?;
    Ok(AuditRecord {
        id: get(row, 0)?,
        user_id: get(row, 1)?,
        action: get(row, 2)?,
        resource_type: get(row, 3)?,
        resource_id: get(row, 4)?,
        ip: get(row, 5)?,
        ua: get(row, 6)?,
        metadata: serde_json::from_str(&metadata_json)
            .map_err(|e| OmError::storage(format!("parse audit metadata: {e}")))?,
        timestamp: parse_ts(&timestamp)?,
    })
}

pub fn api_key(row: &Row<'_>) -> OmResult<ApiKeyRecord> {
    let scopes_json: String = get(row, 2)?;
    let created: String = get(row, 3)?;
    let last_used: Option<String> = get(row, 4)?;
    Ok(ApiKeyRecord {
        hash: get(row, 0)?,
        user_id: get(row, 1)?,
        scopes: serde_json::from_str(&scopes_json)
            .map_err(|e| OmError::storage(format!("parse scopes: {e}")))?,
        created_at: parse_ts(&created)?,
        last_used_at: last_used.as_deref().map(parse_ts).transpose()?,
        disabled: get::<i64>(row, 5)? != 0,
    })
}

/// Little-endian f32 blob codec shared with the remote backend's BYTEA
/// payloads.
pub fn f32_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_blob_round_trip() {
        let v = vec![0.25f32, -1.5, 3.75, 0.0];
        assert_eq!(bytes_to_f32(&f32_to_bytes(&v)), v);
    }

    #[test]
    fn truncated_blob_drops_partial_floats() {
        let mut bytes = f32_to_bytes(&[1.0, 2.0]);
        bytes.pop();
        assert_eq!(bytes_to_f32(&bytes).len(), 1);
    }
}
