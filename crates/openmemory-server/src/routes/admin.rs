//! Admin surface: users, their keys, backup inventory. Gated by the admin
//! middleware.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use openmemory_auth::keys::KeyManager;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PageParams {
    pub l: Option<usize>,
    pub u: Option<usize>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let users = state
        .store
        .list_users(page.l.unwrap_or(100).min(1000), page.u.unwrap_or(0))
        .await?;
    let users: Vec<serde_json::Value> = users
        .into_iter()
        .map(|u| {
            serde_json::json!({
                "user_id": u.user_id,
                "summary": u.summary,
                "reflection_count": u.reflection_count,
                "created_at": u.created_at,
                "last_seen_at": u.last_seen_at,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = state
        .store
        .get_user(&id)
        .await?
        .ok_or_else(|| openmemory_core::OmError::not_found("user", &id))?;
    let memory_count = state.store.count_memories_by_user(&id).await?;
    let recent_audit = state.store.list_audit(&id, 20).await?;
    Ok(Json(serde_json::json!({
        "user_id": user.user_id,
        "summary": user.summary,
        "reflection_count": user.reflection_count,
        "created_at": user.created_at,
        "last_seen_at": user.last_seen_at,
        "memory_count": memory_count,
        "recent_audit": recent_audit,
    })))
}

/// Destroys the user and everything they own.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.memory.delete_all_for_user(&id).await?;
    Ok(Json(serde_json::json!({ "user_id": id, "memories_removed": removed })))
}

pub async fn list_keys(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let manager = KeyManager::new(&state.store);
    let keys: Vec<serde_json::Value> = manager
        .list_for_user(&id)
        .await?
        .into_iter()
        .map(|k| {
            serde_json::json!({
                "created_at": k.created_at,
                "last_used_at": k.last_used_at,
                "scopes": k.scopes,
                "disabled": k.disabled,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "user_id": id, "keys": keys })))
}

#[derive(Deserialize)]
pub struct CreateKeyBody {
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec!["memory:read".into(), "memory:write".into()]
}

/// Mint a key; the plaintext appears in this response and never again.
pub async fn create_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateKeyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let manager = KeyManager::new(&state.store);
    let scopes: Vec<&str> = body.scopes.iter().map(|s| s.as_str()).collect();
    let plaintext = manager.create(&id, &scopes).await?;
    Ok(Json(serde_json::json!({
        "user_id": id,
        "key": plaintext,
        "scopes": body.scopes,
    })))
}

pub async fn backup_status(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let cfg = state.config.get();
    let backups = state.store.list_backups(&cfg.backup_dir)?;
    Ok(Json(serde_json::json!({
        "dir": cfg.backup_dir,
        "retention": cfg.backup_retention,
        "backups": backups,
    })))
}
