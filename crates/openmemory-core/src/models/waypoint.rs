//! Associative edge between two memories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directed weighted link between memory items of one user.
/// Primary key is (src_id, dst_id, user_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub src_id: String,
    pub dst_id: String,
    pub user_id: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(src_id: &str, dst_id: &str, user_id: &str, weight: f64) -> Self {
        let now = Utc::now();
        Self {
            src_id: src_id.to_string(),
            dst_id: dst_id.to_string(),
            user_id: user_id.to_string(),
            weight,
            created_at: now,
            updated_at: now,
        }
    }
}
