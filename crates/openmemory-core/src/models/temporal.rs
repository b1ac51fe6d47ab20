//! Temporal knowledge graph rows: facts with validity intervals and
//! weighted edges between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (subject, predicate, object) triple stamped with a validity interval.
///
/// `valid_to = None` means the fact is still current. At most one fact per
/// (subject, predicate) may be open at a time; inserting a newer fact closes
/// the prior interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalFact {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl TemporalFact {
    pub fn new(
        user_id: &str,
        subject: &str,
        predicate: &str,
        object: &str,
        valid_from: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            valid_from,
            valid_to: None,
            confidence: 1.0,
            last_updated: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Whether the validity interval `[valid_from, valid_to)` contains `at`.
    pub fn valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.map_or(true, |to| at < to)
    }
}

/// Weighted, optionally time-bounded edge between two facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalEdge {
    pub id: String,
    pub user_id: String,
    pub source_fact: String,
    pub target_fact: String,
    pub relation_type: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub weight: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Filter for `query_facts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactQuery {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    /// When set, return facts whose interval contains this instant;
    /// when unset, return the latest open intervals.
    pub as_of: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_interval_contains_any_later_instant() {
        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let fact = TemporalFact::new("u1", "alice", "works_at", "Acme", from);
        assert!(fact.valid_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        assert!(!fact.valid_at(Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap()));
    }

    #[test]
    fn closed_interval_excludes_its_end() {
        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let mut fact = TemporalFact::new("u1", "alice", "works_at", "Acme", from);
        fact.valid_to = Some(to);
        assert!(fact.valid_at(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()));
        assert!(!fact.valid_at(to));
    }
}
