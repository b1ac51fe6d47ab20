//! Vector row operations, remote dialect.

use openmemory_core::models::VectorRecord;
use openmemory_core::{OmResult, Sector};

use crate::embedded::rows::f32_to_bytes;
use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn insert<E: PgExec>(exec: &E, record: &VectorRecord) -> OmResult<()> {
    let blob = f32_to_bytes(&record.payload);
    let stmt = exec
        .stmt(&rq(st::INSERT_VECTOR))
        .await
        .map_err(|e| map_pg_err(e, "insert_vector prepare"))?;
    exec.exec(
        &stmt,
        &[
            &record.memory_id,
            &record.sector.as_str(),
            &record.user_id,
            &blob,
            &(record.dim as i32),
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_vector"))?;
    Ok(())
}

pub async fn get<E: PgExec>(
    exec: &E,
    memory_id: &str,
    sector: Sector,
    user_id: &str,
) -> OmResult<Option<VectorRecord>> {
    let stmt = exec
        .stmt(&rq(st::GET_VECTOR))
        .await
        .map_err(|e| map_pg_err(e, "get_vector prepare"))?;
    let rows = exec
        .rows(&stmt, &[&memory_id, &sector.as_str(), &user_id])
        .await
        .map_err(|e| map_pg_err(e, "get_vector"))?;
    rows.first().map(rows::vector).transpose()
}

pub async fn batch_get<E: PgExec>(
    exec: &E,
    memory_ids: &[String],
    user_id: &str,
) -> OmResult<Vec<VectorRecord>> {
    let stmt = exec
        .stmt(&rq(st::GET_VECTORS_BY_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "batch_get prepare"))?;
    let mut out = Vec::with_capacity(memory_ids.len());
    for id in memory_ids {
        let page = exec
            .rows(&stmt, &[&id, &user_id])
            .await
            .map_err(|e| map_pg_err(e, "batch_get"))?;
        for row in &page {
            out.push(rows::vector(row)?);
        }
    }
    Ok(out)
}

pub async fn scan_by_sector<E: PgExec>(
    exec: &E,
    user_id: &str,
    sector: Sector,
    cursor: &str,
    limit: usize,
) -> OmResult<(Vec<VectorRecord>, Option<String>)> {
    let stmt = exec
        .stmt(&rq(st::SCAN_VECTORS_BY_SECTOR))
        .await
        .map_err(|e| map_pg_err(e, "scan_vectors prepare"))?;
    let page = exec
        .rows(&stmt, &[&user_id, &sector.as_str(), &cursor, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "scan_vectors"))?;
    let records: Vec<VectorRecord> = page.iter().map(rows::vector).collect::<OmResult<_>>()?;
    let next = if records.len() == limit {
        records.last().map(|r| r.memory_id.clone())
    } else {
        None
    };
    Ok((records, next))
}

pub async fn delete_by_memory<E: PgExec>(
    exec: &E,
    memory_id: &str,
    user_id: &str,
) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_VECTORS_BY_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "delete_vectors prepare"))?;
    let n = exec
        .exec(&stmt, &[&memory_id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_vectors"))?;
    Ok(n as usize)
}

pub async fn delete_by_user<E: PgExec>(exec: &E, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_VECTORS_BY_USER))
        .await
        .map_err(|e| map_pg_err(e, "delete_vectors_by_user prepare"))?;
    let n = exec
        .exec(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_vectors_by_user"))?;
    Ok(n as usize)
}
