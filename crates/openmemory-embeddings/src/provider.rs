//! Tagged provider variants behind one surface.
//!
//! Callers never inspect the tag; adding a provider means adding a variant
//! and implementing the three operations.

use std::time::Duration;

use serde::Serialize;

use openmemory_core::config::EmbedKind;
use openmemory_core::{OmConfig, OmResult, Sector};

use crate::daemon::DaemonClient;
use crate::remote_api::RemoteApiClient;
use crate::router::{EmbedOutput, Router};
use crate::synthetic::Synthetic;

/// Stable health shape; `available=false` with empty fields when a probe
/// does not resolve inside its budget.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub available: bool,
    pub version: Option<String>,
    pub models_loaded: Vec<String>,
}

impl ProviderHealth {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            version: None,
            models_loaded: Vec::new(),
        }
    }
}

pub enum Embedder {
    Synthetic(Synthetic),
    LocalDaemon {
        daemon: DaemonClient,
        fallback: Synthetic,
    },
    RemoteApi {
        api: RemoteApiClient,
        fallback: Synthetic,
    },
    Router(Router),
}

impl Embedder {
    /// Construct the provider selected by configuration.
    pub fn from_config(cfg: &OmConfig) -> Self {
        let dim = cfg.vec_dim;
        let timeout = Duration::from_millis(cfg.embed_timeout_ms);
        let daemon = || DaemonClient::new(&cfg.embed_daemon_url, &cfg.embed_model, dim, timeout);
        let remote = || {
            cfg.embed_api_url.as_ref().map(|url| {
                RemoteApiClient::new(
                    url,
                    cfg.embed_api_key.as_deref().unwrap_or_default(),
                    &cfg.embed_model,
                    dim,
                    timeout,
                )
            })
        };

        match cfg.embed_kind {
            EmbedKind::Synthetic => Embedder::Synthetic(Synthetic::new(dim)),
            EmbedKind::LocalDaemon => Embedder::LocalDaemon {
                daemon: daemon(),
                fallback: Synthetic::new(dim),
            },
            EmbedKind::RemoteApi => match remote() {
                Some(api) => Embedder::RemoteApi {
                    api,
                    fallback: Synthetic::new(dim),
                },
                None => Embedder::Synthetic(Synthetic::new(dim)),
            },
            EmbedKind::Router => Embedder::Router(Router::new(
                Some(daemon()),
                remote(),
                dim,
                cfg.embed_mode == openmemory_core::config::EmbedMode::Advanced,
            )),
        }
    }

    /// Embed one text. The variant decides routing; failures inside real
    /// providers degrade to the synthetic fallback and mark the output.
    pub async fn embed_full(&self, text: &str, sector: Option<Sector>) -> OmResult<EmbedOutput> {
        match self {
            Embedder::Synthetic(s) => Ok(EmbedOutput {
                vector: s.embed(text),
                fallback: false,
            }),
            Embedder::LocalDaemon { daemon, fallback } => match daemon.embed(text, None).await {
                Ok(vector) => Ok(EmbedOutput {
                    vector,
                    fallback: false,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "daemon embed failed, using synthetic fallback");
                    Ok(EmbedOutput {
                        vector: fallback.embed(text),
                        fallback: true,
                    })
                }
            },
            Embedder::RemoteApi { api, fallback } => match api.embed(text).await {
                Ok(vector) => Ok(EmbedOutput {
                    vector,
                    fallback: false,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "remote embed failed, using synthetic fallback");
                    Ok(EmbedOutput {
                        vector: fallback.embed(text),
                        fallback: true,
                    })
                }
            },
            Embedder::Router(router) => router.embed(text, sector).await,
        }
    }

    /// Contract form: `embed(text) -> vector`.
    pub async fn embed(&self, text: &str, sector: Option<Sector>) -> OmResult<Vec<f32>> {
        Ok(self.embed_full(text, sector).await?.vector)
    }

    pub async fn embed_batch(&self, texts: &[String]) -> OmResult<Vec<Vec<f32>>> {
        match self {
            Embedder::Synthetic(s) => Ok(s.embed_batch(texts)),
            Embedder::RemoteApi { api, .. } => api.embed_batch(texts).await,
            _ => {
                let mut out = Vec::with_capacity(texts.len());
                for text in texts {
                    out.push(self.embed(text, None).await?);
                }
                Ok(out)
            }
        }
    }

    /// Health with a bounded probe. Never blocks past the budget.
    pub async fn health(&self, budget: Duration) -> ProviderHealth {
        match self {
            Embedder::Synthetic(_) => ProviderHealth {
                available: true,
                version: Some("synthetic".into()),
                models_loaded: vec!["synthetic".into()],
            },
            Embedder::LocalDaemon { daemon, .. } => match daemon.probe(budget).await {
                Some(version) => ProviderHealth {
                    available: true,
                    version: Some(version),
                    models_loaded: vec![daemon.model().to_string()],
                },
                None => ProviderHealth::unavailable(),
            },
            Embedder::RemoteApi { .. } => ProviderHealth {
                available: true,
                version: None,
                models_loaded: Vec::new(),
            },
            Embedder::Router(router) => match router.probe(budget).await {
                Some(version) => ProviderHealth {
                    available: true,
                    version: Some(version),
                    models_loaded: router.models_loaded(),
                },
                None => ProviderHealth::unavailable(),
            },
        }
    }

    /// The micro-cache, when this variant carries one.
    pub fn micro_cache(&self) -> Option<&crate::micro_cache::MicroCache> {
        match self {
            Embedder::Router(router) => Some(router.micro_cache()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthetic_variant_is_always_healthy() {
        let embedder = Embedder::Synthetic(Synthetic::new(32));
        let health = embedder.health(Duration::from_millis(50)).await;
        assert!(health.available);
    }

    #[tokio::test]
    async fn synthetic_embed_matches_dimension() {
        let embedder = Embedder::Synthetic(Synthetic::new(128));
        let v = embedder.embed("dimensional check", None).await.unwrap();
        assert_eq!(v.len(), 128);
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let embedder = Embedder::Synthetic(Synthetic::new(32));
        let single = embedder.embed("one", None).await.unwrap();
        let batch = embedder
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], single);
    }
}
