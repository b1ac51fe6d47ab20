//! # openmemory-temporal
//!
//! The temporal fact graph: append-only facts with `[valid_from, valid_to)`
//! intervals and weighted edges between them. Insertion enforces the
//! single-open-interval invariant per (subject, predicate) inside one
//! transaction.

use std::sync::Arc;

use chrono::Duration;

use openmemory_core::models::{FactQuery, TemporalEdge, TemporalFact};
use openmemory_core::{OmError, OmResult};
use openmemory_storage::MemoryStore;

/// Gap inserted between a closed interval and its successor.
const CLOSE_EPSILON_MS: i64 = 1;

pub struct TemporalGraph {
    store: Arc<MemoryStore>,
}

impl TemporalGraph {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Insert a fact. When an open interval already exists for the fact's
    /// (subject, predicate) and the new `valid_from` is strictly later, the
    /// open interval is closed at `valid_from - epsilon` in the same
    /// transaction. An overlapping insert (not strictly later) conflicts.
    pub async fn insert_fact(&self, fact: &TemporalFact) -> OmResult<TemporalFact> {
        if !(0.0..=1.0).contains(&fact.confidence) {
            return Err(OmError::validation("confidence must be within [0, 1]"));
        }
        if let Some(to) = fact.valid_to {
            if to < fact.valid_from {
                return Err(OmError::validation("valid_to precedes valid_from"));
            }
        }

        let fact = fact.clone();
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if let Some(open) = tx
                        .find_open_fact(&fact.user_id, &fact.subject, &fact.predicate)
                        .await?
                    {
                        if fact.valid_from > open.valid_from {
                            let close_at =
                                fact.valid_from - Duration::milliseconds(CLOSE_EPSILON_MS);
                            tx.close_fact_interval(&open.id, &fact.user_id, close_at)
                                .await?;
                            tracing::debug!(
                                subject = %fact.subject,
                                predicate = %fact.predicate,
                                "closed prior open interval"
                            );
                        } else {
                            return Err(OmError::conflict(format!(
                                "open interval for ({}, {}) starts at or after the new fact",
                                fact.subject, fact.predicate
                            )));
                        }
                    }
                    tx.insert_fact(&fact).await?;
                    Ok(fact)
                })
            })
            .await
    }

    /// Bitemporal query. With `as_of`, facts valid at that instant; without,
    /// the open intervals.
    pub async fn query_facts(&self, user_id: &str, q: &FactQuery) -> OmResult<Vec<TemporalFact>> {
        self.store.query_facts(user_id, q).await
    }

    /// Insert an edge; both endpoints must exist and the weight must be
    /// positive.
    pub async fn insert_edge(&self, edge: &TemporalEdge) -> OmResult<()> {
        if edge.weight <= 0.0 {
            return Err(OmError::validation("edge weight must be positive"));
        }
        let edge = edge.clone();
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    for endpoint in [&edge.source_fact, &edge.target_fact] {
                        if tx.get_fact(endpoint, &edge.user_id).await?.is_none() {
                            return Err(OmError::not_found("temporal fact", endpoint.clone()));
                        }
                    }
                    tx.insert_edge(&edge).await
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn graph() -> TemporalGraph {
        let registry = Arc::new(openmemory_crypto::KeyRegistry::new(1, [5u8; 32]));
        let cipher = Arc::new(openmemory_crypto::ContentCipher::new(registry));
        let store = MemoryStore::open_in_memory(false, cipher).await.unwrap();
        TemporalGraph::new(Arc::new(store))
    }

    fn fact(subject: &str, object: &str, year: i32) -> TemporalFact {
        TemporalFact::new(
            "u1",
            subject,
            "works_at",
            object,
            Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn newer_fact_closes_the_open_interval() {
        let graph = graph().await;
        graph.insert_fact(&fact("alice", "Acme", 2020)).await.unwrap();
        graph.insert_fact(&fact("alice", "Globex", 2023)).await.unwrap();

        // Only one open interval remains.
        let open = graph
            .query_facts("u1", &FactQuery::default())
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].object, "Globex");

        // The closed interval covers 2022.
        let at_2022 = graph
            .query_facts(
                "u1",
                &FactQuery {
                    subject: Some("alice".into()),
                    as_of: Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(at_2022.len(), 1);
        assert_eq!(at_2022[0].object, "Acme");
        let closed_at = at_2022[0].valid_to.expect("interval closed");
        assert!(closed_at < Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn overlapping_insert_conflicts() {
        let graph = graph().await;
        graph.insert_fact(&fact("bob", "Initech", 2023)).await.unwrap();
        let err = graph.insert_fact(&fact("bob", "Initrode", 2020)).await.unwrap_err();
        assert!(matches!(err, OmError::Conflict { .. }));
    }

    #[tokio::test]
    async fn duplicate_fact_conflicts() {
        let graph = graph().await;
        graph.insert_fact(&fact("carol", "Acme", 2021)).await.unwrap();
        let err = graph.insert_fact(&fact("carol", "Acme", 2021)).await.unwrap_err();
        assert!(matches!(err, OmError::Conflict { .. }));
    }

    #[tokio::test]
    async fn edge_requires_existing_endpoints() {
        let graph = graph().await;
        let a = graph.insert_fact(&fact("dave", "Acme", 2020)).await.unwrap();

        let mut edge = TemporalEdge {
            id: "e1".into(),
            user_id: "u1".into(),
            source_fact: a.id.clone(),
            target_fact: "missing".into(),
            relation_type: "caused_by".into(),
            valid_from: Utc::now(),
            valid_to: None,
            weight: 0.8,
            metadata: serde_json::Map::new(),
        };
        assert!(matches!(
            graph.insert_edge(&edge).await.unwrap_err(),
            OmError::NotFound { .. }
        ));

        edge.target_fact = a.id.clone();
        graph.insert_edge(&edge).await.unwrap();
    }

    #[tokio::test]
    async fn zero_weight_edge_is_invalid() {
        let graph = graph().await;
        let a = graph.insert_fact(&fact("erin", "Acme", 2020)).await.unwrap();
        let edge = TemporalEdge {
            id: "e2".into(),
            user_id: "u1".into(),
            source_fact: a.id.clone(),
            target_fact: a.id.clone(),
            relation_type: "self".into(),
            valid_from: Utc::now(),
            valid_to: None,
            weight: 0.0,
            metadata: serde_json::Map::new(),
        };
        assert!(matches!(
            graph.insert_edge(&edge).await.unwrap_err(),
            OmError::Validation { .. }
        ));
    }
}
