//! The memory item, the unit of storage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sector::Sector;

/// A single memory owned by a user.
///
/// `content` holds plaintext while the item is in memory; the storage layer
/// encrypts it at rest and records the key version used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub content_hash: String,
    pub primary_sector: Sector,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Activity score in [0, 1]; decays with time, rises with reinforcement.
    pub salience: f64,
    /// Per-item decay coefficient, >= 0.
    pub decay_rate: f64,
    /// Monotonic counter, incremented on every mutation.
    pub version: i64,
    /// Encryption key version the stored ciphertext was written with.
    pub key_version: u32,
    /// Set by the decay job when salience falls below the archival floor.
    pub archived: bool,
}

impl MemoryItem {
    /// Construct a fresh item with a random id and the given plaintext.
    pub fn new(user_id: &str, content: &str, sector: Sector) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            content_hash: crate::hash::content_hash(content),
            primary_sector: sector,
            tags: BTreeSet::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            salience: 0.5,
            decay_rate: 0.02,
            version: 1,
            key_version: 0,
            archived: false,
        }
    }

    /// Clamp salience into [0, 1] after an adjustment.
    pub fn clamp_salience(&mut self) {
        self.salience = self.salience.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_at_version_one() {
        let m = MemoryItem::new("u1", "remember this", Sector::Semantic);
        assert_eq!(m.version, 1);
        assert_eq!(m.user_id, "u1");
        assert!(!m.archived);
        assert!((0.0..=1.0).contains(&m.salience));
    }

    #[test]
    fn clamp_salience_bounds() {
        let mut m = MemoryItem::new("u1", "x", Sector::Semantic);
        m.salience = 1.7;
        m.clamp_salience();
        assert_eq!(m.salience, 1.0);
        m.salience = -0.3;
        m.clamp_salience();
        assert_eq!(m.salience, 0.0);
    }
}
