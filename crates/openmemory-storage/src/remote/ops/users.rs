//! User row operations, remote dialect.

use chrono::Utc;

use openmemory_core::OmResult;

use crate::embedded::ops::users::UserRow;
use crate::remote::{map_pg_err, rq, PgExec};
use crate::sql::statements as st;

fn row_to_user(row: &tokio_postgres::Row) -> OmResult<UserRow> {
    let get = |idx: usize| -> OmResult<_> {
        row.try_get(idx)
            .map_err(|e| openmemory_core::OmError::storage(format!("user column {idx}: {e}")))
    };
    Ok(UserRow {
        user_id: get(0)?,
        summary: row
            .try_get(1)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        reflection_count: row
            .try_get(2)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        created_at: row
            .try_get(3)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
        last_seen_at: row
            .try_get(4)
            .map_err(|e| openmemory_core::OmError::storage(e.to_string()))?,
    })
}

pub async fn upsert_seen<E: PgExec>(exec: &E, user_id: &str) -> OmResult<()> {
    let now = Utc::now();
    let stmt = exec
        .stmt(&rq(st::UPSERT_USER))
        .await
        .map_err(|e| map_pg_err(e, "upsert_user prepare"))?;
    exec.exec(&stmt, &[&user_id, &now, &now])
        .await
        .map_err(|e| map_pg_err(e, "upsert_user"))?;
    Ok(())
}

pub async fn get<E: PgExec>(exec: &E, user_id: &str) -> OmResult<Option<UserRow>> {
    let stmt = exec
        .stmt(&rq(st::GET_USER))
        .await
        .map_err(|e| map_pg_err(e, "get_user prepare"))?;
    let page = exec
        .rows(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "get_user"))?;
    page.first().map(row_to_user).transpose()
}

pub async fn list<E: PgExec>(exec: &E, limit: usize, offset: usize) -> OmResult<Vec<UserRow>> {
    let stmt = exec
        .stmt(&rq(st::LIST_USERS))
        .await
        .map_err(|e| map_pg_err(e, "list_users prepare"))?;
    let page = exec
        .rows(&stmt, &[&(limit as i64), &(offset as i64)])
        .await
        .map_err(|e| map_pg_err(e, "list_users"))?;
    page.iter().map(row_to_user).collect()
}

pub async fn set_summary<E: PgExec>(exec: &E, user_id: &str, summary: &str) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::SET_USER_SUMMARY))
        .await
        .map_err(|e| map_pg_err(e, "set_summary prepare"))?;
    exec.exec(&stmt, &[&summary, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "set_summary"))?;
    Ok(())
}

pub async fn delete<E: PgExec>(exec: &E, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_USER))
        .await
        .map_err(|e| map_pg_err(e, "delete_user prepare"))?;
    let n = exec
        .exec(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_user"))?;
    Ok(n as usize)
}
