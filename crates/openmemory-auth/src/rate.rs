//! Fixed-window rate limiting.
//!
//! Counters live in the store keyed by (api_key_or_ip, window_start), so a
//! restart or a second node sharing the remote backend sees the same
//! windows. Retry-after comes from the window boundary.

use openmemory_core::{OmError, OmResult};
use openmemory_storage::MemoryStore;

pub struct RateLimiter {
    enabled: bool,
    window_ms: u64,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(enabled: bool, window_ms: u64, max_requests: u64) -> Self {
        Self {
            enabled,
            window_ms: window_ms.max(1),
            max_requests,
        }
    }

    /// Count this request against the caller's current window. Returns
    /// `RateLimited` with the seconds until the window rolls over once the
    /// limit is crossed.
    pub async fn check(&self, store: &MemoryStore, caller_key: &str) -> OmResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let window_start = now_ms - (now_ms % self.window_ms);
        let hits = store
            .rate_limit_bump(caller_key, window_start as i64)
            .await?;
        if hits as u64 > self.max_requests {
            let window_end = window_start + self.window_ms;
            let retry_after_secs = (window_end.saturating_sub(now_ms)).div_ceil(1000).max(1);
            return Err(OmError::RateLimited { retry_after_secs });
        }
        Ok(())
    }

    /// Windows older than two periods are dead weight; compaction calls
    /// this with `now`.
    pub fn prune_horizon(&self, now_ms: u64) -> i64 {
        now_ms.saturating_sub(2 * self.window_ms) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store() -> MemoryStore {
        let registry = Arc::new(openmemory_crypto::KeyRegistry::new(1, [3u8; 32]));
        let cipher = Arc::new(openmemory_crypto::ContentCipher::new(registry));
        MemoryStore::open_in_memory(false, cipher).await.unwrap()
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_rejects() {
        let store = store().await;
        let limiter = RateLimiter::new(true, 60_000, 3);
        for _ in 0..3 {
            limiter.check(&store, "caller").await.unwrap();
        }
        let err = limiter.check(&store, "caller").await.unwrap_err();
        match err {
            OmError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs >= 1);
                assert!(retry_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_limiter_never_rejects() {
        let store = store().await;
        let limiter = RateLimiter::new(false, 60_000, 1);
        for _ in 0..10 {
            limiter.check(&store, "caller").await.unwrap();
        }
    }

    #[tokio::test]
    async fn distinct_callers_have_distinct_windows() {
        let store = store().await;
        let limiter = RateLimiter::new(true, 60_000, 1);
        limiter.check(&store, "alpha").await.unwrap();
        limiter.check(&store, "beta").await.unwrap();
        assert!(limiter.check(&store, "alpha").await.is_err());
    }
}
