//! Hosted embedding API client.
//!
//! Bearer-keyed, retries 5xx with exponential backoff, honors Retry-After
//! on 429.

use std::time::Duration;

use serde::Deserialize;

use openmemory_core::{OmError, OmResult};

use crate::synthetic::fit_dimension;

const MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct RemoteApiClient {
    url: String,
    api_key: String,
    model: String,
    dim: usize,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

impl RemoteApiClient {
    pub fn new(url: &str, api_key: &str, model: &str, dim: usize, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dim,
            http,
        }
    }

    pub async fn embed(&self, text: &str) -> OmResult<Vec<f32>> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors.into_iter().next().ok_or_else(|| {
            OmError::DependencyUnavailable {
                dependency: "embedding api".into(),
                reason: "empty response".into(),
            }
        })
    }

    pub async fn embed_batch(&self, texts: &[String]) -> OmResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let mut attempt = 0;
        loop {
            let resp = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: ApiResponse = resp.json().await.map_err(|e| {
                        OmError::DependencyUnavailable {
                            dependency: "embedding api".into(),
                            reason: format!("malformed response: {e}"),
                        }
                    })?;
                    return Ok(parsed
                        .data
                        .into_iter()
                        .map(|d| fit_dimension(d.embedding, self.dim))
                        .collect());
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        return Err(OmError::RateLimited {
                            retry_after_secs: wait,
                        });
                    }
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        return Err(OmError::DependencyUnavailable {
                            dependency: "embedding api".into(),
                            reason: format!("status {}", resp.status()),
                        });
                    }
                    let backoff = Duration::from_millis(200 << attempt);
                    tokio::time::sleep(backoff).await;
                }
                Ok(resp) => {
                    return Err(OmError::DependencyUnavailable {
                        dependency: "embedding api".into(),
                        reason: format!("status {}", resp.status()),
                    });
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        return Err(OmError::DependencyUnavailable {
                            dependency: "embedding api".into(),
                            reason: e.to_string(),
                        });
                    }
                    let backoff = Duration::from_millis(200 << attempt);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
