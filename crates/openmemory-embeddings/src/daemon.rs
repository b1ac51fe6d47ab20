//! Local model daemon client (Ollama-style HTTP API).

use std::time::Duration;

use serde::Deserialize;

use openmemory_core::{OmError, OmResult};

use crate::synthetic::fit_dimension;

/// Client for a pluggable local model server.
#[derive(Clone)]
pub struct DaemonClient {
    base_url: String,
    model: String,
    dim: usize,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct VersionResponse {
    #[serde(default)]
    version: String,
}

impl DaemonClient {
    pub fn new(base_url: &str, model: &str, dim: usize, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dim,
            http,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed through the daemon with the configured model tag; the result is
    /// fitted to the configured dimension.
    pub async fn embed(&self, text: &str, model_override: Option<&str>) -> OmResult<Vec<f32>> {
        let model = model_override.unwrap_or(&self.model);
        let body = serde_json::json!({ "model": model, "prompt": text });
        let resp = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| OmError::DependencyUnavailable {
                dependency: "embedding daemon".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(OmError::DependencyUnavailable {
                dependency: "embedding daemon".into(),
                reason: format!("status {}", resp.status()),
            });
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
            OmError::DependencyUnavailable {
                dependency: "embedding daemon".into(),
                reason: format!("malformed response: {e}"),
            }
        })?;
        Ok(fit_dimension(parsed.embedding, self.dim))
    }

    /// Liveness probe against the daemon's version endpoint, bounded by the
    /// given budget. Returns the reported version on success.
    pub async fn probe(&self, budget: Duration) -> Option<String> {
        let url = format!("{}/api/version", self.base_url);
        let fut = self.http.get(url).send();
        match tokio::time::timeout(budget, fut).await {
            Ok(Ok(resp)) if resp.status().is_success() => {
                let parsed: VersionResponse = resp.json().await.unwrap_or(VersionResponse {
                    version: String::new(),
                });
                Some(parsed.version)
            }
            _ => None,
        }
    }
}
