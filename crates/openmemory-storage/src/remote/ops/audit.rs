//! Audit log operations, remote dialect. Append-only.

use openmemory_core::models::AuditRecord;
use openmemory_core::OmResult;

use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn insert<E: PgExec>(exec: &E, record: &AuditRecord) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::INSERT_AUDIT))
        .await
        .map_err(|e| map_pg_err(e, "insert_audit prepare"))?;
    exec.exec(
        &stmt,
        &[
            &record.id,
            &record.user_id,
            &record.action,
            &record.resource_type,
            &record.resource_id,
            &record.ip,
            &record.ua,
            &record.metadata,
            &record.timestamp,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_audit"))?;
    Ok(())
}

pub async fn list_by_user<E: PgExec>(
    exec: &E,
    user_id: &str,
    limit: usize,
) -> OmResult<Vec<AuditRecord>> {
    let stmt = exec
        .stmt(&rq(st::LIST_AUDIT_BY_USER))
        .await
        .map_err(|e| map_pg_err(e, "list_audit prepare"))?;
    let page = exec
        .rows(&stmt, &[&user_id, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "list_audit"))?;
    page.iter().map(rows::audit).collect()
}
