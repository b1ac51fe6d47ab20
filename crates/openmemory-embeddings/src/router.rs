//! Sector-routing meta-provider.
//!
//! Looks up the micro-cache, then the long-lived cache, then dispatches to
//! the daemon or hosted API with a sector-specific model tag, and finally
//! falls back to the synthetic provider, marking the result.

use std::time::Duration;

use openmemory_core::{OmResult, Sector};

use crate::cache::EmbeddingCache;
use crate::daemon::DaemonClient;
use crate::micro_cache::MicroCache;
use crate::remote_api::RemoteApiClient;
use crate::synthetic::Synthetic;

/// Output of a routed embedding, carrying whether the synthetic fallback
/// produced the vector.
#[derive(Debug, Clone)]
pub struct EmbedOutput {
    pub vector: Vec<f32>,
    pub fallback: bool,
}

pub struct Router {
    pub(crate) daemon: Option<DaemonClient>,
    pub(crate) remote: Option<RemoteApiClient>,
    synthetic: Synthetic,
    micro: MicroCache,
    long_lived: EmbeddingCache,
    advanced: bool,
}

impl Router {
    pub fn new(
        daemon: Option<DaemonClient>,
        remote: Option<RemoteApiClient>,
        dim: usize,
        advanced: bool,
    ) -> Self {
        Self {
            daemon,
            remote,
            synthetic: Synthetic::new(dim),
            micro: MicroCache::default(),
            long_lived: EmbeddingCache::new(4096),
            advanced,
        }
    }

    pub fn micro_cache(&self) -> &MicroCache {
        &self.micro
    }

    /// Model tag for a sector. Simple mode routes everything to the daemon's
    /// default model; advanced mode picks CPU-friendly tags per sector.
    pub fn model_for(&self, sector: Option<Sector>) -> Option<&'static str> {
        if !self.advanced {
            return None;
        }
        Some(match sector {
            Some(Sector::Episodic) | Some(Sector::Emotional) => "nomic-embed-text",
            Some(Sector::Procedural) => "all-minilm",
            Some(Sector::Semantic) | Some(Sector::Reflective) | None => "mxbai-embed-large",
        })
    }

    pub async fn embed(&self, text: &str, sector: Option<Sector>) -> OmResult<EmbedOutput> {
        let key = MicroCache::key_for(text);
        if let Some(vector) = self.micro.get(&key) {
            return Ok(EmbedOutput {
                vector,
                fallback: false,
            });
        }
        if let Some(vector) = self.long_lived.get(&key) {
            self.micro.insert(key, vector.clone(), 1.0);
            return Ok(EmbedOutput {
                vector,
                fallback: false,
            });
        }

        let (vector, fallback) = self.dispatch(text, sector).await;
        if !fallback {
            self.long_lived.insert(key.clone(), vector.clone());
        }
        self.micro.insert(key, vector.clone(), if fallback { 0.5 } else { 1.0 });
        Ok(EmbedOutput { vector, fallback })
    }

    async fn dispatch(&self, text: &str, sector: Option<Sector>) -> (Vec<f32>, bool) {
        if let Some(daemon) = &self.daemon {
            match daemon.embed(text, self.model_for(sector)).await {
                Ok(vector) => return (vector, false),
                Err(e) => {
                    tracing::warn!(error = %e, "daemon embed failed, trying next provider");
                }
            }
        }
        if let Some(remote) = &self.remote {
            match remote.embed(text).await {
                Ok(vector) => return (vector, false),
                Err(e) => {
                    tracing::warn!(error = %e, "remote embed failed, using synthetic fallback");
                }
            }
        }
        (self.synthetic.embed(text), true)
    }

    /// Probe the active backend, bounded by the budget.
    pub async fn probe(&self, budget: Duration) -> Option<String> {
        match &self.daemon {
            Some(daemon) => daemon.probe(budget).await,
            None => None,
        }
    }

    pub fn models_loaded(&self) -> Vec<String> {
        let mut models = Vec::new();
        if let Some(daemon) = &self.daemon {
            models.push(daemon.model().to_string());
        }
        if self.advanced {
            for tag in ["nomic-embed-text", "all-minilm", "mxbai-embed-large"] {
                if !models.iter().any(|m| m == tag) {
                    models.push(tag.to_string());
                }
            }
        }
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_router() -> Router {
        Router::new(None, None, 64, true)
    }

    #[tokio::test]
    async fn falls_back_to_synthetic_without_backends() {
        let router = bare_router();
        let out = router.embed("no backends here", None).await.unwrap();
        assert!(out.fallback);
        assert_eq!(out.vector.len(), 64);
    }

    #[tokio::test]
    async fn repeat_queries_return_identical_vectors() {
        let router = bare_router();
        let first = router.embed("repeated query", None).await.unwrap();
        let second = router.embed("repeated query", None).await.unwrap();
        assert_eq!(first.vector, second.vector);
    }

    #[tokio::test]
    async fn fallback_vectors_do_not_stick_in_the_micro_cache() {
        let router = bare_router();
        let key = MicroCache::key_for("ephemeral");
        router.embed("ephemeral", None).await.unwrap();
        // Inserted at reduced score, so the effective score sits below the
        // hit threshold and the entry self-expires on lookup.
        assert_eq!(router.micro_cache().get(&key), None);
    }

    #[test]
    fn sector_routing_picks_distinct_models() {
        let router = bare_router();
        assert_ne!(
            router.model_for(Some(Sector::Episodic)),
            router.model_for(Some(Sector::Procedural))
        );
    }
}
