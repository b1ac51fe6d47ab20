//! Long-lived embedding cache behind the micro-cache.
//!
//! moka with TinyLFU admission; keys are content digests, values are
//! finished vectors.

use std::time::Duration;

use moka::sync::Cache;

pub struct EmbeddingCache {
    cache: Cache<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(Duration::from_secs(3600))
            .time_to_live(Duration::from_secs(86400))
            .build();
        Self { cache }
    }

    pub fn get(&self, digest: &str) -> Option<Vec<f32>> {
        self.cache.get(digest)
    }

    pub fn insert(&self, digest: String, vector: Vec<f32>) {
        self.cache.insert(digest, vector);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let cache = EmbeddingCache::new(100);
        cache.insert("k".into(), vec![1.0, 2.0]);
        assert_eq!(cache.get("k"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get("missing"), None);
    }
}
