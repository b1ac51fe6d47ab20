//! Singleton-per-job enforcement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// One flag per job name. `try_start` hands out a guard that clears the
/// flag on drop, so a panicking job cannot wedge its slot.
pub struct JobRegistry {
    running: DashMap<&'static str, Arc<AtomicBool>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            running: DashMap::new(),
        }
    }

    /// Claim the job slot; `None` when an instance is already running.
    pub fn try_start(&self, name: &'static str) -> Option<RunningJob> {
        let flag = self
            .running
            .entry(name)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RunningJob { flag })
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running
            .get(name)
            .map(|f| f.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Names of jobs currently holding their slot.
    pub fn active(&self) -> Vec<String> {
        self.running
            .iter()
            .filter(|e| e.value().load(Ordering::Acquire))
            .map(|e| e.key().to_string())
            .collect()
    }
}

/// Guard for a claimed job slot.
pub struct RunningJob {
    flag: Arc<AtomicBool>,
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_first_drops() {
        let registry = JobRegistry::new();
        let guard = registry.try_start("decay").expect("first claim");
        assert!(registry.try_start("decay").is_none());
        assert!(registry.is_running("decay"));

        drop(guard);
        assert!(!registry.is_running("decay"));
        assert!(registry.try_start("decay").is_some());
    }

    #[test]
    fn jobs_have_independent_slots() {
        let registry = JobRegistry::new();
        let _decay = registry.try_start("decay").unwrap();
        assert!(registry.try_start("compaction").is_some());
        assert_eq!(registry.active(), vec!["decay".to_string()]);
    }
}
