//! Temporal fact and edge operations, remote dialect.

use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;

use openmemory_core::models::{FactQuery, TemporalEdge, TemporalFact};
use openmemory_core::OmResult;

use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn insert_fact<E: PgExec>(exec: &E, fact: &TemporalFact) -> OmResult<()> {
    let metadata = serde_json::Value::Object(fact.metadata.clone());
    let stmt = exec
        .stmt(&rq(st::INSERT_FACT))
        .await
        .map_err(|e| map_pg_err(e, "insert_fact prepare"))?;
    exec.exec(
        &stmt,
        &[
            &fact.id,
            &fact.user_id,
            &fact.subject,
            &fact.predicate,
            &fact.object,
            &fact.valid_from,
            &fact.valid_to,
            &fact.confidence,
            &fact.last_updated,
            &metadata,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_fact"))?;
    Ok(())
}

pub async fn find_open<E: PgExec>(
    exec: &E,
    user_id: &str,
    subject: &str,
    predicate: &str,
) -> OmResult<Option<TemporalFact>> {
    let stmt = exec
        .stmt(&rq(st::FIND_OPEN_FACT))
        .await
        .map_err(|e| map_pg_err(e, "find_open prepare"))?;
    let page = exec
        .rows(&stmt, &[&user_id, &subject, &predicate])
        .await
        .map_err(|e| map_pg_err(e, "find_open"))?;
    page.first().map(rows::fact).transpose()
}

pub async fn close_interval<E: PgExec>(
    exec: &E,
    fact_id: &str,
    user_id: &str,
    valid_to: DateTime<Utc>,
) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::CLOSE_FACT_INTERVAL))
        .await
        .map_err(|e| map_pg_err(e, "close_interval prepare"))?;
    exec.exec(&stmt, &[&valid_to, &Utc::now(), &fact_id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "close_interval"))?;
    Ok(())
}

pub async fn get_fact<E: PgExec>(exec: &E, id: &str, user_id: &str) -> OmResult<Option<TemporalFact>> {
    let stmt = exec
        .stmt(&rq(st::GET_FACT))
        .await
        .map_err(|e| map_pg_err(e, "get_fact prepare"))?;
    let page = exec
        .rows(&stmt, &[&id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "get_fact"))?;
    page.first().map(rows::fact).transpose()
}

/// Dynamic fact query mirroring the embedded implementation; clauses and
/// bindings are appended in lockstep, then the whole statement is rewritten
/// into the remote dialect.
pub async fn query_facts<E: PgExec>(
    exec: &E,
    user_id: &str,
    q: &FactQuery,
) -> OmResult<Vec<TemporalFact>> {
    let mut sql = format!(
        "SELECT {} FROM temporal_facts WHERE user_id = ?",
        st::FACT_COLUMNS
    );
    let user = user_id.to_string();
    let limit = q.limit.unwrap_or(100) as i64;
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&user];

    if let Some(subject) = &q.subject {
        sql.push_str(" AND subject = ?");
        params.push(subject);
    }
    if let Some(predicate) = &q.predicate {
        sql.push_str(" AND predicate = ?");
        params.push(predicate);
    }
    let as_of = q.as_of;
    if let Some(at) = &as_of {
        sql.push_str(" AND valid_from <= ? AND (valid_to IS NULL OR valid_to > ?)");
        params.push(at);
        params.push(at);
    } else {
        sql.push_str(" AND valid_to IS NULL");
    }
    sql.push_str(" ORDER BY valid_from DESC LIMIT ?");
    params.push(&limit);

    let stmt = exec
        .stmt(&rq(&sql))
        .await
        .map_err(|e| map_pg_err(e, "query_facts prepare"))?;
    let page = exec
        .rows(&stmt, &params)
        .await
        .map_err(|e| map_pg_err(e, "query_facts"))?;
    page.iter().map(rows::fact).collect()
}

pub async fn insert_edge<E: PgExec>(exec: &E, edge: &TemporalEdge) -> OmResult<()> {
    let metadata = serde_json::Value::Object(edge.metadata.clone());
    let stmt = exec
        .stmt(&rq(st::INSERT_EDGE))
        .await
        .map_err(|e| map_pg_err(e, "insert_edge prepare"))?;
    exec.exec(
        &stmt,
        &[
            &edge.id,
            &edge.user_id,
            &edge.source_fact,
            &edge.target_fact,
            &edge.relation_type,
            &edge.valid_from,
            &edge.valid_to,
            &edge.weight,
            &metadata,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "insert_edge"))?;
    Ok(())
}

pub async fn delete_facts_by_object<E: PgExec>(
    exec: &E,
    user_id: &str,
    object: &str,
) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_FACTS_BY_OBJECT))
        .await
        .map_err(|e| map_pg_err(e, "delete_facts prepare"))?;
    let n = exec
        .exec(&stmt, &[&user_id, &object])
        .await
        .map_err(|e| map_pg_err(e, "delete_facts"))?;
    Ok(n as usize)
}

pub async fn merge_duplicate_facts<E: PgExec>(exec: &E) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::MERGE_DUPLICATE_FACTS))
        .await
        .map_err(|e| map_pg_err(e, "merge_duplicates prepare"))?;
    let n = exec
        .exec(&stmt, &[])
        .await
        .map_err(|e| map_pg_err(e, "merge_duplicates"))?;
    Ok(n as usize)
}
