//! Health, sectors, embedding config/status, dashboard stats.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use openmemory_core::Sector;

use crate::error::ApiResult;
use crate::state::AppState;

/// Probe budget for liveness endpoints; they must answer quickly whatever
/// the daemon is doing.
const PROBE_BUDGET: Duration = Duration::from_millis(1500);

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cfg = state.config.get();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": cfg.mode.protocol(),
    }))
}

pub async fn sectors() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "sectors": Sector::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    }))
}

pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.store.dashboard_stats().await?;
    Ok(Json(serde_json::json!({
        "stats": stats,
        "active_jobs": state.jobs.active(),
        "tenant_warnings": state.store.tenant_guard().violation_count(),
    })))
}

pub async fn embed_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cfg = state.config.get();
    Json(serde_json::json!({
        "kind": cfg.embed_kind,
        "mode": cfg.embed_mode,
        "dim": cfg.vec_dim,
        "model": cfg.embed_model,
        "daemon_url": cfg.embed_daemon_url,
    }))
}

#[derive(Deserialize)]
pub struct EmbedConfigBody {
    pub embed_kind: Option<String>,
    pub embed_mode: Option<String>,
    pub embed_model: Option<String>,
    pub daemon_url: Option<String>,
}

/// Update provider settings: writes the corresponding environment keys and
/// reloads the config snapshot. The provider itself is rebuilt on next
/// process start; until then routing changes apply where they are read
/// through the handle.
pub async fn set_embed_config(
    State(state): State<AppState>,
    Json(body): Json<EmbedConfigBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(kind) = &body.embed_kind {
        std::env::set_var("EMBED_KIND", kind);
    }
    if let Some(mode) = &body.embed_mode {
        std::env::set_var("EMBED_MODE", mode);
    }
    if let Some(model) = &body.embed_model {
        std::env::set_var("EMBED_MODEL", model);
    }
    if let Some(url) = &body.daemon_url {
        std::env::set_var("EMBED_DAEMON_URL", url);
    }
    let fresh = state.config.reload()?;
    Ok(Json(serde_json::json!({
        "kind": fresh.embed_kind,
        "mode": fresh.embed_mode,
        "model": fresh.embed_model,
        "daemon_url": fresh.embed_daemon_url,
    })))
}

/// Stable-shape liveness for the local daemon; `available=false` rather
/// than an error when the probe cannot resolve.
pub async fn daemon_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.embedder.health(PROBE_BUDGET).await;
    Json(serde_json::json!({
        "available": health.available,
        "version": health.version,
        "models_loaded": health.models_loaded,
    }))
}
