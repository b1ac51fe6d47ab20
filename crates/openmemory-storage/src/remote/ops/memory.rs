//! Memory row CRUD, remote dialect.

use chrono::{DateTime, Utc};

use openmemory_core::models::MemoryItem;
use openmemory_core::{OmError, OmResult, Sector};

use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn insert<E: PgExec>(exec: &E, item: &MemoryItem) -> OmResult<()> {
    let tags = serde_json::to_value(&item.tags).map_err(|e| OmError::storage(e.to_string()))?;
    let metadata = serde_json::Value::Object(item.metadata.clone());
    let stmt = exec
        .stmt(&rq(st::INSERT_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "insert_memory prepare"))?;
    exec.exec(
        &stmt,
        &[
            &item.id,
            &item.user_id,
            &item.content,
            &item.content_hash,
            &item.primary_sector.as_str(),
            &tags,
            &metadata,
            &item.created_at,
            &item.updated_at,
            &item.last_accessed_at,
            &item.salience,
            &item.decay_rate,
            &item.version,
            &(item.key_version as i32),
            &item.archived,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_memory"))?;
    Ok(())
}

pub async fn get<E: PgExec>(exec: &E, id: &str) -> OmResult<Option<MemoryItem>> {
    let stmt = exec
        .stmt(&rq(st::GET_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "get_memory prepare"))?;
    let rows = exec
        .rows(&stmt, &[&id])
        .await
        .map_err(|e| map_pg_err(e, "get_memory"))?;
    rows.first().map(rows::memory).transpose()
}

pub async fn get_by_hash<E: PgExec>(
    exec: &E,
    user_id: &str,
    content_hash: &str,
) -> OmResult<Option<MemoryItem>> {
    let stmt = exec
        .stmt(&rq(st::GET_MEMORY_BY_HASH))
        .await
        .map_err(|e| map_pg_err(e, "get_by_hash prepare"))?;
    let rows = exec
        .rows(&stmt, &[&user_id, &content_hash])
        .await
        .map_err(|e| map_pg_err(e, "get_by_hash"))?;
    rows.first().map(rows::memory).transpose()
}

pub async fn list_by_user<E: PgExec>(
    exec: &E,
    user_id: &str,
    sector: Option<Sector>,
    limit: usize,
    offset: usize,
) -> OmResult<Vec<MemoryItem>> {
    let rows = match sector {
        Some(s) => {
            let stmt = exec
                .stmt(&rq(st::LIST_MEMORIES_BY_USER_SECTOR))
                .await
                .map_err(|e| map_pg_err(e, "list_by_user prepare"))?;
            exec.rows(
                &stmt,
                &[&user_id, &s.as_str(), &(limit as i64), &(offset as i64)],
            )
            .await
        }
        None => {
            let stmt = exec
                .stmt(&rq(st::LIST_MEMORIES_BY_USER))
                .await
                .map_err(|e| map_pg_err(e, "list_by_user prepare"))?;
            exec.rows(&stmt, &[&user_id, &(limit as i64), &(offset as i64)])
                .await
        }
    }
    .map_err(|e| map_pg_err(e, "list_by_user"))?;
    rows.iter().map(rows::memory).collect()
}

pub async fn list_recent<E: PgExec>(
    exec: &E,
    user_id: &str,
    limit: usize,
) -> OmResult<Vec<MemoryItem>> {
    let stmt = exec
        .stmt(&rq(st::LIST_RECENT_MEMORIES))
        .await
        .map_err(|e| map_pg_err(e, "list_recent prepare"))?;
    let rows = exec
        .rows(&stmt, &[&user_id, &false, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "list_recent"))?;
    rows.iter().map(rows::memory).collect()
}

pub async fn update<E: PgExec>(exec: &E, item: &MemoryItem) -> OmResult<usize> {
    let tags = serde_json::to_value(&item.tags).map_err(|e| OmError::storage(e.to_string()))?;
    let metadata = serde_json::Value::Object(item.metadata.clone());
    let stmt = exec
        .stmt(&rq(st::UPDATE_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "update_memory prepare"))?;
    let n = exec
        .exec(
            &stmt,
            &[
                &item.content,
                &item.content_hash,
                &item.primary_sector.as_str(),
                &tags,
                &metadata,
                &item.updated_at,
                &item.last_accessed_at,
                &item.salience,
                &item.decay_rate,
                &(item.key_version as i32),
                &item.archived,
                &item.id,
                &item.user_id,
            ],
        )
        .await
        .map_err(|e| map_pg_err(e, "update_memory"))?;
    Ok(n as usize)
}

pub async fn touch<E: PgExec>(exec: &E, id: &str, user_id: &str) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::TOUCH_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "touch prepare"))?;
    exec.exec(&stmt, &[&Utc::now(), &id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "touch"))?;
    Ok(())
}

pub async fn get_salience<E: PgExec>(exec: &E, id: &str, user_id: &str) -> OmResult<Option<f64>> {
    let stmt = exec
        .stmt(&rq(st::GET_SALIENCE))
        .await
        .map_err(|e| map_pg_err(e, "get_salience prepare"))?;
    let rows = exec
        .rows(&stmt, &[&id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "get_salience"))?;
    rows.first()
        .map(|r| r.try_get(0).map_err(|e| map_pg_err(e, "get_salience column")))
        .transpose()
}

pub async fn set_salience<E: PgExec>(
    exec: &E,
    id: &str,
    user_id: &str,
    salience: f64,
) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::SET_SALIENCE))
        .await
        .map_err(|e| map_pg_err(e, "set_salience prepare"))?;
    exec.exec(&stmt, &[&salience, &Utc::now(), &id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "set_salience"))?;
    Ok(())
}

pub async fn delete<E: PgExec>(exec: &E, id: &str, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "delete_memory prepare"))?;
    let n = exec
        .exec(&stmt, &[&id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_memory"))?;
    Ok(n as usize)
}

pub async fn delete_by_user<E: PgExec>(exec: &E, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_MEMORIES_BY_USER))
        .await
        .map_err(|e| map_pg_err(e, "delete_by_user prepare"))?;
    let n = exec
        .exec(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_by_user"))?;
    Ok(n as usize)
}

pub async fn count_by_user<E: PgExec>(exec: &E, user_id: &str) -> OmResult<i64> {
    let stmt = exec
        .stmt(&rq(st::COUNT_MEMORIES_BY_USER))
        .await
        .map_err(|e| map_pg_err(e, "count prepare"))?;
    let rows = exec
        .rows(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "count"))?;
    rows.first()
        .map(|r| r.try_get(0).map_err(|e| map_pg_err(e, "count column")))
        .unwrap_or(Ok(0))
}

pub async fn scan_for_decay<E: PgExec>(
    exec: &E,
    cursor: &str,
    limit: usize,
) -> OmResult<Vec<(String, String, f64, f64, DateTime<Utc>)>> {
    let stmt = exec
        .stmt(&rq(st::SCAN_MEMORIES_FOR_DECAY))
        .await
        .map_err(|e| map_pg_err(e, "scan_for_decay prepare"))?;
    let rows = exec
        .rows(&stmt, &[&false, &cursor, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "scan_for_decay"))?;
    rows.iter()
        .map(|r| {
            Ok((
                r.try_get(0).map_err(|e| map_pg_err(e, "decay id"))?,
                r.try_get(1).map_err(|e| map_pg_err(e, "decay user"))?,
                r.try_get(2).map_err(|e| map_pg_err(e, "decay salience"))?,
                r.try_get(3).map_err(|e| map_pg_err(e, "decay rate"))?,
                r.try_get(4).map_err(|e| map_pg_err(e, "decay accessed"))?,
            ))
        })
        .collect()
}

pub async fn apply_decay<E: PgExec>(
    exec: &E,
    id: &str,
    user_id: &str,
    salience: f64,
    archived: bool,
) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::APPLY_DECAY))
        .await
        .map_err(|e| map_pg_err(e, "apply_decay prepare"))?;
    exec.exec(&stmt, &[&salience, &archived, &id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "apply_decay"))?;
    Ok(())
}

pub async fn scan_for_key_rotation<E: PgExec>(
    exec: &E,
    target_version: u32,
    cursor: &str,
    limit: usize,
) -> OmResult<Vec<(String, String, String, u32)>> {
    let stmt = exec
        .stmt(&rq(st::SCAN_FOR_KEY_ROTATION))
        .await
        .map_err(|e| map_pg_err(e, "scan_rotation prepare"))?;
    let rows = exec
        .rows(&stmt, &[&(target_version as i32), &cursor, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "scan_rotation"))?;
    rows.iter()
        .map(|r| {
            Ok((
                r.try_get(0).map_err(|e| map_pg_err(e, "rotation id"))?,
                r.try_get(1).map_err(|e| map_pg_err(e, "rotation user"))?,
                r.try_get(2).map_err(|e| map_pg_err(e, "rotation content"))?,
                r.try_get::<_, i32>(3)
                    .map_err(|e| map_pg_err(e, "rotation version"))? as u32,
            ))
        })
        .collect()
}

pub async fn rewrite_content_key<E: PgExec>(
    exec: &E,
    id: &str,
    user_id: &str,
    ciphertext: &str,
    key_version: u32,
) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::REWRITE_CONTENT_KEY))
        .await
        .map_err(|e| map_pg_err(e, "rewrite_key prepare"))?;
    exec.exec(&stmt, &[&ciphertext, &(key_version as i32), &id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "rewrite_key"))?;
    Ok(())
}
