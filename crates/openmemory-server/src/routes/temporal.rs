//! Temporal fact graph routes.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use openmemory_core::models::{FactQuery, TemporalEdge, TemporalFact};

use crate::error::ApiResult;
use crate::state::{AppState, AuthContext};

#[derive(Deserialize)]
pub struct FactBody {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub user_id: Option<String>,
}

pub async fn insert_fact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<FactBody>,
) -> ApiResult<Json<TemporalFact>> {
    let user_id = auth.resolve_user(body.user_id.as_deref());
    let mut fact = TemporalFact::new(
        user_id,
        &body.subject,
        &body.predicate,
        &body.object,
        body.valid_from.unwrap_or_else(Utc::now),
    );
    fact.valid_to = body.valid_to;
    if let Some(confidence) = body.confidence {
        fact.confidence = confidence;
    }
    fact.metadata = body.metadata;

    let inserted = state.temporal.insert_fact(&fact).await?;
    Ok(Json(inserted))
}

#[derive(Deserialize)]
pub struct FactsParams {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub as_of: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub user_id: Option<String>,
}

pub async fn query_facts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<FactsParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = auth.resolve_user(params.user_id.as_deref());
    let facts = state
        .temporal
        .query_facts(
            user_id,
            &FactQuery {
                subject: params.subject,
                predicate: params.predicate,
                as_of: params.as_of,
                limit: params.limit,
            },
        )
        .await?;
    Ok(Json(serde_json::json!({ "facts": facts })))
}

#[derive(Deserialize)]
pub struct EdgeBody {
    pub source_fact: String,
    pub target_fact: String,
    pub relation_type: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub weight: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub user_id: Option<String>,
}

pub async fn insert_edge(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<EdgeBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = auth.resolve_user(body.user_id.as_deref());
    let edge = TemporalEdge {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        source_fact: body.source_fact,
        target_fact: body.target_fact,
        relation_type: body.relation_type,
        valid_from: body.valid_from.unwrap_or_else(Utc::now),
        valid_to: body.valid_to,
        weight: body.weight,
        metadata: body.metadata,
    };
    state.temporal.insert_edge(&edge).await?;
    Ok(Json(serde_json::json!({ "id": edge.id })))
}
