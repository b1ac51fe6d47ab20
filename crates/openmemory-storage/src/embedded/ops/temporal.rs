//! Temporal fact and edge operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use openmemory_core::models::{FactQuery, TemporalEdge, TemporalFact};
use openmemory_core::{OmError, OmResult};

use crate::embedded::write_conn::busy_to_storage;
use crate::embedded::{rows, ts};
use crate::sql::statements as st;

pub fn insert_fact(conn: &Connection, fact: &TemporalFact) -> OmResult<()> {
    let metadata =
        serde_json::to_string(&fact.metadata).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::INSERT_FACT)
        .map_err(|e| busy_to_storage(e, "insert_fact prepare"))?
        .execute(params![
            fact.id,
            fact.user_id,
            fact.subject,
            fact.predicate,
            fact.object,
            ts(fact.valid_from),
            fact.valid_to.map(ts),
            fact.confidence,
            ts(fact.last_updated),
            metadata,
        ])
        .map_err(|e| busy_to_storage(e, "insert_fact"))?;
    Ok(())
}

pub fn find_open(
    conn: &Connection,
    user_id: &str,
    subject: &str,
    predicate: &str,
) -> OmResult<Option<TemporalFact>> {
    conn.prepare_cached(st::FIND_OPEN_FACT)
        .map_err(|e| busy_to_storage(e, "find_open prepare"))?
        .query_row(params![user_id, subject, predicate], |row| {
            Ok(rows::fact(row))
        })
        .optional()
        .map_err(|e| busy_to_storage(e, "find_open"))?
        .transpose()
}

pub fn close_interval(
    conn: &Connection,
    fact_id: &str,
    user_id: &str,
    valid_to: DateTime<Utc>,
) -> OmResult<()> {
    conn.prepare_cached(st::CLOSE_FACT_INTERVAL)
        .map_err(|e| busy_to_storage(e, "close_interval prepare"))?
        .execute(params![ts(valid_to), ts(Utc::now()), fact_id, user_id])
        .map_err(|e| busy_to_storage(e, "close_interval"))?;
    Ok(())
}

pub fn get_fact(conn: &Connection, id: &str, user_id: &str) -> OmResult<Option<TemporalFact>> {
    conn.prepare_cached(st::GET_FACT)
        .map_err(|e| busy_to_storage(e, "get_fact prepare"))?
        .query_row(params![id, user_id], |row| Ok(rows::fact(row)))
        .optional()
        .map_err(|e| busy_to_storage(e, "get_fact"))?
        .transpose()
}

/// Dynamic fact query; the statement is assembled from the filter and the
/// params bound in the same order the clauses are appended.
pub fn query_facts(
    conn: &Connection,
    user_id: &str,
    q: &FactQuery,
) -> OmResult<Vec<TemporalFact>> {
    let mut sql = format!(
        "SELECT {} FROM temporal_facts WHERE user_id = ?",
        st::FACT_COLUMNS
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(subject) = &q.subject {
        sql.push_str(" AND subject = ?");
        params.push(Box::new(subject.clone()));
    }
    if let Some(predicate) = &q.predicate {
        sql.push_str(" AND predicate = ?");
        params.push(Box::new(predicate.clone()));
    }
    match q.as_of {
        Some(at) => {
            sql.push_str(" AND valid_from <= ? AND (valid_to IS NULL OR valid_to > ?)");
            params.push(Box::new(ts(at)));
            params.push(Box::new(ts(at)));
        }
        None => sql.push_str(" AND valid_to IS NULL"),
    }
    sql.push_str(" ORDER BY valid_from DESC LIMIT ?");
    params.push(Box::new(q.limit.unwrap_or(100) as i64));

    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| busy_to_storage(e, "query_facts prepare"))?;
    let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mapped = stmt
        .query_map(refs.as_slice(), |row| Ok(rows::fact(row)))
        .map_err(|e| busy_to_storage(e, "query_facts"))?;
    let mut out = Vec::new();
    for fact in mapped {
        out.push(fact.map_err(|e| busy_to_storage(e, "query_facts row"))??);
    }
    Ok(out)
}

pub fn insert_edge(conn: &Connection, edge: &TemporalEdge) -> OmResult<()> {
    let metadata =
        serde_json::to_string(&edge.metadata).map_err(|e| OmError::storage(e.to_string()))?;
    conn.prepare_cached(st::INSERT_EDGE)
        .map_err(|e| busy_to_storage(e, "insert_edge prepare"))?
        .execute(params![
            edge.id,
            edge.user_id,
            edge.source_fact,
            edge.target_fact,
            edge.relation_type,
            ts(edge.valid_from),
            edge.valid_to.map(ts),
            edge.weight,
            metadata,
        ])
        .map_err(|e| busy_to_storage(e, "insert_edge"))?;
    Ok(())
}

pub fn delete_facts_by_object(conn: &Connection, user_id: &str, object: &str) -> OmResult<usize> {
    conn.prepare_cached(st::DELETE_FACTS_BY_OBJECT)
        .map_err(|e| busy_to_storage(e, "delete_facts prepare"))?
        .execute(params![user_id, object])
        .map_err(|e| busy_to_storage(e, "delete_facts"))
}

/// Duplicate facts share (user, subject, predicate, object) with overlapping
/// intervals; compaction keeps the earliest row of each group.
pub fn merge_duplicate_facts(conn: &Connection) -> OmResult<usize> {
    conn.execute(st::MERGE_DUPLICATE_FACTS, params![])
        .map_err(|e| busy_to_storage(e, "merge_duplicates"))
}
