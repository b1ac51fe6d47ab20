//! Fixed-window rate-limit counters, remote dialect.

use openmemory_core::OmResult;

use crate::remote::{map_pg_err, rq, PgExec};
use crate::sql::statements as st;

pub async fn bump<E: PgExec>(exec: &E, key: &str, window_start: i64) -> OmResult<i64> {
    let stmt = exec
        .stmt(&rq(st::RATE_LIMIT_BUMP))
        .await
        .map_err(|e| map_pg_err(e, "rate_bump prepare"))?;
    let page = exec
        .rows(&stmt, &[&key, &window_start])
        .await
        .map_err(|e| map_pg_err(e, "rate_bump"))?;
    page.first()
        .map(|r| r.try_get(0).map_err(|e| map_pg_err(e, "rate_bump column")))
        .unwrap_or(Ok(1))
}

pub async fn prune<E: PgExec>(exec: &E, horizon: i64) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::PRUNE_RATE_WINDOWS))
        .await
        .map_err(|e| map_pg_err(e, "rate_prune prepare"))?;
    let n = exec
        .exec(&stmt, &[&horizon])
        .await
        .map_err(|e| map_pg_err(e, "rate_prune"))?;
    Ok(n as usize)
}
