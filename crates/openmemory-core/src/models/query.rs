//! Query request/response shapes shared between the engine and transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sector::Sector;

/// How results are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Batch,
    Stream,
}

/// A similarity + keyword query scoped to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub k: usize,
    #[serde(default)]
    pub sectors: Option<Vec<Sector>>,
    pub user_id: String,
    /// Restrict candidates to items created within the last N days.
    #[serde(default)]
    pub time_window_days: Option<f64>,
    #[serde(default)]
    pub mode: QueryMode,
}

/// One ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub primary_sector: Sector,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
