//! Scored micro-cache for query embeddings.
//!
//! Bounded map from content digest to (vector, timestamp, score). A lookup
//! is a hit only while the time-decayed effective score stays above the
//! threshold:
//!
//! ```text
//! effective = lambda * stored_score + (1 - lambda) * e^(-age/tau)
//! ```
//!
//! Eviction removes the oldest entry and runs on insert, not on a timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const DEFAULT_CAPACITY: usize = 32;
const DEFAULT_LAMBDA: f64 = 0.7;
const DEFAULT_TAU: Duration = Duration::from_secs(3600);
const DEFAULT_THRESHOLD: f64 = 0.85;

struct Entry {
    vector: Vec<f32>,
    stored_at: Instant,
    score: f64,
}

pub struct MicroCache {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    lambda: f64,
    tau: Duration,
    threshold: f64,
}

impl Default for MicroCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_LAMBDA, DEFAULT_TAU, DEFAULT_THRESHOLD)
    }
}

impl MicroCache {
    pub fn new(capacity: usize, lambda: f64, tau: Duration, threshold: f64) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            capacity: capacity.max(1),
            lambda,
            tau,
            threshold,
        }
    }

    /// Digest used as the cache key.
    pub fn key_for(text: &str) -> String {
        blake3::hash(text.as_bytes()).to_hex().to_string()
    }

    /// Return the cached vector if its effective score still clears the
    /// threshold; stale entries are dropped on the spot.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock();
        let effective = {
            let entry = entries.get(key)?;
            self.effective_score(entry)
        };
        if effective >= self.threshold {
            Some(entries.get(key).expect("checked above").vector.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    /// Insert with a fresh timestamp, evicting the oldest entry when full.
    pub fn insert(&self, key: String, vector: Vec<f32>, score: f64) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                vector,
                stored_at: Instant::now(),
                score,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn effective_score(&self, entry: &Entry) -> f64 {
        let age = entry.stored_at.elapsed().as_secs_f64();
        let freshness = (-age / self.tau.as_secs_f64()).exp();
        self.lambda * entry.score + (1.0 - self.lambda) * freshness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_high_score_entry_hits() {
        let cache = MicroCache::default();
        let key = MicroCache::key_for("query text");
        cache.insert(key.clone(), vec![0.1, 0.2], 1.0);
        assert_eq!(cache.get(&key), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn low_score_entry_misses_and_is_dropped() {
        let cache = MicroCache::default();
        let key = MicroCache::key_for("weak entry");
        // lambda*0.2 + (1-lambda)*~1.0 = 0.14 + 0.3 < 0.85
        cache.insert(key.clone(), vec![0.5], 0.2);
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_removes_oldest() {
        let cache = MicroCache::new(2, 0.7, Duration::from_secs(3600), 0.85);
        cache.insert("a".into(), vec![1.0], 1.0);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("b".into(), vec![2.0], 1.0);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("c".into(), vec![3.0], 1.0);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn capacity_one_still_works() {
        let cache = MicroCache::new(1, 0.7, Duration::from_secs(3600), 0.85);
        cache.insert("a".into(), vec![1.0], 1.0);
        cache.insert("b".into(), vec![2.0], 1.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }
}
