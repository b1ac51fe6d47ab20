//! Dense embedding row tied to a memory.

use serde::{Deserialize, Serialize};

use crate::sector::Sector;

/// One embedding per (memory, sector, user). Lifetime equals the owning
/// memory's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub memory_id: String,
    pub sector: Sector,
    pub user_id: String,
    pub payload: Vec<f32>,
    pub dim: usize,
}

impl VectorRecord {
    pub fn new(memory_id: &str, sector: Sector, user_id: &str, payload: Vec<f32>) -> Self {
        let dim = payload.len();
        Self {
            memory_id: memory_id.to_string(),
            sector,
            user_id: user_id.to_string(),
            payload,
            dim,
        }
    }
}
