//! Aggregate counters, remote dialect.

use openmemory_core::OmResult;

use crate::remote::{map_pg_err, rq, PgExec};
use crate::sql::statements as st;

async fn scalar<E: PgExec>(exec: &E, sql: &str) -> OmResult<i64> {
    let stmt = exec
        .stmt(&rq(sql))
        .await
        .map_err(|e| map_pg_err(e, "stats prepare"))?;
    let rows = exec
        .rows(&stmt, &[])
        .await
        .map_err(|e| map_pg_err(e, "stats"))?;
    rows.first()
        .map(|r| r.try_get(0).map_err(|e| map_pg_err(e, "stats column")))
        .unwrap_or(Ok(0))
}

pub async fn count_memories<E: PgExec>(exec: &E) -> OmResult<i64> {
    scalar(exec, st::COUNT_ALL_MEMORIES).await
}

pub async fn count_users<E: PgExec>(exec: &E) -> OmResult<i64> {
    scalar(exec, st::COUNT_ALL_USERS).await
}

pub async fn count_facts<E: PgExec>(exec: &E) -> OmResult<i64> {
    scalar(exec, st::COUNT_ALL_FACTS).await
}

pub async fn count_waypoints<E: PgExec>(exec: &E) -> OmResult<i64> {
    scalar(exec, st::COUNT_ALL_WAYPOINTS).await
}

pub async fn sector_histogram<E: PgExec>(exec: &E) -> OmResult<Vec<(String, i64)>> {
    let stmt = exec
        .stmt(&rq(st::SECTOR_HISTOGRAM))
        .await
        .map_err(|e| map_pg_err(e, "histogram prepare"))?;
    let rows = exec
        .rows(&stmt, &[])
        .await
        .map_err(|e| map_pg_err(e, "histogram"))?;
    rows.iter()
        .map(|r| {
            Ok((
                r.try_get(0).map_err(|e| map_pg_err(e, "histogram sector"))?,
                r.try_get(1).map_err(|e| map_pg_err(e, "histogram count"))?,
            ))
        })
        .collect()
}

pub async fn avg_salience<E: PgExec>(exec: &E) -> OmResult<f64> {
    let stmt = exec
        .stmt(&rq(st::AVG_SALIENCE))
        .await
        .map_err(|e| map_pg_err(e, "avg prepare"))?;
    let rows = exec
        .rows(&stmt, &[])
        .await
        .map_err(|e| map_pg_err(e, "avg"))?;
    rows.first()
        .map(|r| {
            r.try_get::<_, Option<f64>>(0)
                .map(|v| v.unwrap_or(0.0))
                .map_err(|e| map_pg_err(e, "avg column"))
        })
        .unwrap_or(Ok(0.0))
}
