//! API key operations, remote dialect.

use chrono::Utc;

use openmemory_core::models::ApiKeyRecord;
use openmemory_core::{OmError, OmResult};

use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn insert<E: PgExec>(exec: &E, key: &ApiKeyRecord) -> OmResult<()> {
    let scopes = serde_json::to_value(&key.scopes).map_err(|e| OmError::storage(e.to_string()))?;
    let stmt = exec
        .stmt(&rq(st::INSERT_API_KEY))
        .await
        .map_err(|e| map_pg_err(e, "insert_key prepare"))?;
    exec.exec(
        &stmt,
        &[
            &key.hash,
            &key.user_id,
            &scopes,
            &key.created_at,
            &key.last_used_at,
            &key.disabled,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_key"))?;
    Ok(())
}

pub async fn list_by_user<E: PgExec>(exec: &E, user_id: &str) -> OmResult<Vec<ApiKeyRecord>> {
    let stmt = exec
        .stmt(&rq(st::LIST_API_KEYS))
        .await
        .map_err(|e| map_pg_err(e, "list_keys prepare"))?;
    let page = exec
        .rows(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "list_keys"))?;
    page.iter().map(rows::api_key).collect()
}

pub async fn list_enabled<E: PgExec>(exec: &E) -> OmResult<Vec<ApiKeyRecord>> {
    let stmt = exec
        .stmt(&rq(st::LIST_ALL_API_KEYS))
        .await
        .map_err(|e| map_pg_err(e, "list_enabled prepare"))?;
    let page = exec
        .rows(&stmt, &[&false])
        .await
        .map_err(|e| map_pg_err(e, "list_enabled"))?;
    page.iter().map(rows::api_key).collect()
}

pub async fn touch<E: PgExec>(exec: &E, hash: &str) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::TOUCH_API_KEY))
        .await
        .map_err(|e| map_pg_err(e, "touch_key prepare"))?;
    exec.exec(&stmt, &[&Utc::now(), &hash])
        .await
        .map_err(|e| map_pg_err(e, "touch_key"))?;
    Ok(())
}

pub async fn disable<E: PgExec>(exec: &E, hash: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DISABLE_API_KEY))
        .await
        .map_err(|e| map_pg_err(e, "disable_key prepare"))?;
    let n = exec
        .exec(&stmt, &[&true, &hash])
        .await
        .map_err(|e| map_pg_err(e, "disable_key"))?;
    Ok(n as usize)
}
