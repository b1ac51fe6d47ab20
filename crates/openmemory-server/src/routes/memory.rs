//! Memory CRUD, query (batch and SSE), ingest, reinforce.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use base64::Engine as _;
use futures::StreamExt;
use serde::Deserialize;

use openmemory_core::models::{QueryMode, QueryRequest};
use openmemory_core::{OmError, Sector};
use openmemory_engine::{AddRequest, DeleteOptions, QueryEvent, UpdateRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, AuthContext};

#[derive(Deserialize)]
pub struct AddBody {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub user_id: Option<String>,
    pub sector: Option<String>,
}

pub async fn add(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<AddBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let sector_hint = body
        .sector
        .as_deref()
        .map(Sector::parse)
        .transpose()
        .map_err(ApiError)?;
    let user_id = auth.resolve_user(body.user_id.as_deref()).to_string();

    let result = state
        .memory
        .add(AddRequest {
            user_id,
            content: body.content,
            tags: body.tags,
            metadata: body.metadata,
            sector_hint,
        })
        .await?;
    Ok(Json(serde_json::json!({
        "id": result.id,
        "primary_sector": result.primary_sector,
        "deduplicated": result.deduplicated,
        "embedding_fallback": result.embedding_fallback,
    })))
}

#[derive(Deserialize)]
pub struct QueryBody {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    pub sectors: Option<Vec<Sector>>,
    pub user_id: Option<String>,
    pub time_window_days: Option<f64>,
}

fn default_k() -> usize {
    10
}

pub async fn query(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    Json(body): Json<QueryBody>,
) -> ApiResult<Response> {
    let wants_stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    let request = QueryRequest {
        query: body.query,
        k: body.k,
        sectors: body.sectors,
        user_id: auth.resolve_user(body.user_id.as_deref()).to_string(),
        time_window_days: body.time_window_days,
        mode: if wants_stream {
            QueryMode::Stream
        } else {
            QueryMode::Batch
        },
    };

    if wants_stream {
        let stream = state.query.query_stream(request).map(|event| {
            let event = match event {
                QueryEvent::Memories(batch) => Event::default()
                    .event("memories")
                    .json_data(&batch)
                    .unwrap_or_else(|_| Event::default().event("error").data("serialization")),
                QueryEvent::Done => Event::default().event("done").data("{}"),
                QueryEvent::Error { code, message } => Event::default()
                    .event("error")
                    .json_data(&serde_json::json!({ "err": code, "message": message }))
                    .unwrap_or_else(|_| Event::default().event("error").data("serialization")),
            };
            Ok::<_, std::convert::Infallible>(event)
        });
        return Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response());
    }

    let matches = state.query.query(&request).await?;
    Ok(Json(serde_json::json!({ "matches": matches })).into_response())
}

#[derive(Deserialize)]
pub struct ListParams {
    /// Limit.
    pub l: Option<usize>,
    /// Offset.
    pub u: Option<usize>,
    pub sector: Option<String>,
    pub user_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let sector = params
        .sector
        .as_deref()
        .map(Sector::parse)
        .transpose()
        .map_err(ApiError)?;
    let user_id = auth.resolve_user(params.user_id.as_deref());
    let items = state
        .memory
        .list(user_id, sector, params.l.unwrap_or(50).min(500), params.u.unwrap_or(0))
        .await?;
    Ok(Json(serde_json::json!({ "items": items, "count": items.len() })))
}

#[derive(Deserialize)]
pub struct UserScope {
    pub user_id: Option<String>,
    #[serde(default)]
    pub cascade_facts: bool,
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Query(scope): Query<UserScope>,
) -> ApiResult<Json<openmemory_core::models::MemoryItem>> {
    let user_id = auth.resolve_user(scope.user_id.as_deref());
    Ok(Json(state.memory.get(&id, user_id).await?))
}

#[derive(Deserialize)]
pub struct PatchBody {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub user_id: Option<String>,
}

pub async fn patch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<PatchBody>,
) -> ApiResult<Json<openmemory_core::models::MemoryItem>> {
    let user_id = auth.resolve_user(body.user_id.as_deref()).to_string();
    let updated = state
        .memory
        .update(UpdateRequest {
            id,
            user_id,
            content: body.content,
            tags: body.tags,
            metadata: body.metadata,
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Query(scope): Query<UserScope>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = auth.resolve_user(scope.user_id.as_deref());
    state
        .memory
        .delete(
            &id,
            user_id,
            DeleteOptions {
                cascade_facts: scope.cascade_facts,
            },
        )
        .await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Deserialize)]
pub struct IngestBody {
    pub content_type: String,
    /// Base64-encoded payload.
    pub data: String,
    pub user_id: Option<String>,
}

pub async fn ingest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<IngestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(&body.data)
        .map_err(|_| ApiError(OmError::validation("data is not valid base64")))?;
    let user_id = auth.resolve_user(body.user_id.as_deref());
    let results = state
        .memory
        .ingest_document(user_id, &body.content_type, &data)
        .await?;
    Ok(Json(serde_json::json!({
        "chunks": results.len(),
        "ids": results.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
pub struct ReinforceBody {
    pub id: String,
    pub boost: f64,
    pub user_id: Option<String>,
    #[serde(default = "default_propagate")]
    pub propagate: bool,
}

fn default_propagate() -> bool {
    true
}

pub async fn reinforce(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ReinforceBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = auth.resolve_user(body.user_id.as_deref());
    let salience = state
        .memory
        .reinforce(&body.id, user_id, body.boost, body.propagate)
        .await?;
    Ok(Json(serde_json::json!({ "id": body.id, "salience": salience })))
}
