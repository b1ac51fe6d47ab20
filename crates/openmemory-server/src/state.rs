//! Shared application state.

use std::sync::Arc;

use openmemory_auth::RateLimiter;
use openmemory_core::{ConfigHandle, OmResult};
use openmemory_crypto::{ContentCipher, KeyRegistry};
use openmemory_embeddings::Embedder;
use openmemory_engine::{MemoryEngine, QueryEngine};
use openmemory_scheduler::registry::JobRegistry;
use openmemory_storage::MemoryStore;
use openmemory_temporal::TemporalGraph;

#[derive(Clone)]
pub struct AppState {
    pub config: ConfigHandle,
    pub store: Arc<MemoryStore>,
    pub memory: Arc<MemoryEngine>,
    pub query: Arc<QueryEngine>,
    pub temporal: Arc<TemporalGraph>,
    pub embedder: Arc<Embedder>,
    pub limiter: Arc<RateLimiter>,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    /// Wire every subsystem from configuration.
    pub async fn build(config: ConfigHandle, jobs: Arc<JobRegistry>) -> OmResult<Self> {
        let cfg = config.get();
        let registry = Arc::new(KeyRegistry::from_config(
            cfg.encryption_key.as_deref(),
            cfg.encryption_key_version,
        )?);
        let cipher = Arc::new(ContentCipher::new(registry));
        let store = Arc::new(MemoryStore::open(&cfg, cipher).await?);
        let embedder = Arc::new(Embedder::from_config(&cfg));
        let memory = Arc::new(MemoryEngine::new(
            store.clone(),
            embedder.clone(),
            config.clone(),
        ));
        let query = Arc::new(QueryEngine::new(
            store.clone(),
            embedder.clone(),
            config.clone(),
        ));
        let temporal = Arc::new(TemporalGraph::new(store.clone()));
        let limiter = Arc::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_window_ms,
            cfg.rate_limit_max_requests,
        ));

        Ok(Self {
            config,
            store,
            memory,
            query,
            temporal,
            embedder,
            limiter,
            jobs,
        })
    }
}

/// Authenticated caller identity attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Key-bound user, when a per-user key authenticated the request.
    pub user_id: Option<String>,
    pub scopes: Vec<String>,
    /// Key material identity for rate limiting (key prefix or client IP).
    pub caller_key: String,
}

impl AuthContext {
    pub fn anonymous(caller_key: String) -> Self {
        Self {
            user_id: None,
            scopes: Vec::new(),
            caller_key,
        }
    }

    /// Resolve the effective user id: explicit request value first, then
    /// the key-bound identity, then the single-tenant default.
    pub fn resolve_user<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|u| !u.is_empty())
            .or(self.user_id.as_deref())
            .unwrap_or("default")
    }
}
