//! Transport-contract tests against the assembled router, embedded backend,
//! synthetic provider.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use openmemory_core::ConfigHandle;
use openmemory_server::{build_router, AppState};

/// Process env is shared across test threads; serialize the set-then-read
/// window.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

async fn test_app() -> Router {
    // Fresh store file per test app; everything else stays on defaults
    // (embedded backend, synthetic embedder, no API key).
    let dir = tempfile::tempdir().unwrap();
    let config = {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DB_PATH", dir.path().join("test.db").display().to_string());
        std::env::set_var("DATA_DIR", dir.path().display().to_string());
        ConfigHandle::from_env().unwrap()
    };
    // Leak the tempdir so the file outlives the router.
    std::mem::forget(dir);

    let jobs = Arc::new(openmemory_scheduler::registry::JobRegistry::new());
    let state = AppState::build(config, jobs).await.unwrap();
    build_router(state)
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_version_and_protocol() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["protocol"], "http");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn sectors_enumerates_all_five() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::get("/sectors").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    let sectors = body["sectors"].as_array().unwrap();
    assert_eq!(sectors.len(), 5);
    assert!(sectors.contains(&serde_json::json!("episodic")));
}

#[tokio::test]
async fn add_then_query_round_trip() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_post(
            "/memory/add",
            serde_json::json!({
                "content": "I went to Paris yesterday and saw the Eiffel Tower",
                "tags": ["travel"],
                "user_id": "u1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let added = body_json(response).await;
    let id = added["id"].as_str().unwrap().to_string();
    let sector = added["primary_sector"].as_str().unwrap();
    assert!(sector == "episodic" || sector == "semantic");

    let response = app
        .oneshot(json_post(
            "/memory/query",
            serde_json::json!({ "query": "Paris", "k": 5, "user_id": "u1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let matches = body["matches"].as_array().unwrap();
    let hit = matches
        .iter()
        .find(|m| m["id"] == serde_json::json!(id))
        .expect("added memory in results");
    assert!(hit["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn sse_query_emits_memories_frames() {
    let app = test_app().await;
    app.clone()
        .oneshot(json_post(
            "/memory/add",
            serde_json::json!({ "content": "streaming about Kyoto gardens", "user_id": "u1" }),
        ))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/memory/query")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "text/event-stream")
        .body(Body::from(
            serde_json::json!({ "query": "Kyoto", "k": 5, "user_id": "u1" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec(),
    )
    .unwrap();
    let first_frame = text
        .split("\n\n")
        .find(|frame| !frame.trim().is_empty())
        .unwrap();
    assert!(first_frame.starts_with("event: memories"), "got: {first_frame}");
    assert!(text.contains("event: done"));
}

#[tokio::test]
async fn ingest_maps_415_and_413() {
    let app = test_app().await;

    let payload = base64::engine::general_purpose::STANDARD.encode(b"\x00\x01\x02");
    let response = app
        .clone()
        .oneshot(json_post(
            "/memory/ingest",
            serde_json::json!({
                "content_type": "application/octet-stream",
                "data": payload,
                "user_id": "u1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = body_json(response).await;
    assert_eq!(body["err"], "unsupported_media_type");

    // MAX_PAYLOAD_SIZE default is 1_000_000; send a little more.
    let oversized = base64::engine::general_purpose::STANDARD.encode(vec![b'a'; 1_000_100]);
    let response = app
        .oneshot(json_post(
            "/memory/ingest",
            serde_json::json!({
                "content_type": "text/plain",
                "data": oversized,
                "user_id": "u1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert_eq!(body["err"], "file_too_large");
}

#[tokio::test]
async fn user_bulk_delete_is_tenant_scoped() {
    let app = test_app().await;
    for (user, content) in [("user-a", "alpha memory"), ("user-b", "beta memory")] {
        app.clone()
            .oneshot(json_post(
                "/memory/add",
                serde_json::json!({ "content": content, "user_id": user }),
            ))
            .await
            .unwrap();
    }

    // No ADMIN_KEY configured: the admin surface refuses.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/admin/users/user-a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            Request::get("/memory/all?user_id=user-b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn unknown_memory_is_404_with_error_body() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::get("/memory/no-such-id?user_id=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["err"], "not_found");
    assert!(body["message"].is_string());
}
