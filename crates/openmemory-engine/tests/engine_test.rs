//! End-to-end engine scenarios over the embedded backend with the
//! synthetic provider.

use std::sync::Arc;

use openmemory_core::models::{QueryMode, QueryRequest};
use openmemory_core::{ConfigHandle, OmConfig, OmError, Sector};
use openmemory_crypto::{ContentCipher, KeyRegistry};
use openmemory_embeddings::synthetic::Synthetic;
use openmemory_embeddings::Embedder;
use openmemory_engine::{AddRequest, DeleteOptions, MemoryEngine, QueryEngine};
use openmemory_storage::MemoryStore;

async fn engines() -> (MemoryEngine, QueryEngine) {
    let registry = Arc::new(KeyRegistry::new(1, [7u8; 32]));
    let cipher = Arc::new(ContentCipher::new(registry));
    let store = Arc::new(MemoryStore::open_in_memory(false, cipher).await.unwrap());
    let config = ConfigHandle::new(OmConfig::from_env().unwrap());
    let embedder = Arc::new(Embedder::Synthetic(Synthetic::new(
        config.get().vec_dim,
    )));
    (
        MemoryEngine::new(store.clone(), embedder.clone(), config.clone()),
        QueryEngine::new(store, embedder, config),
    )
}

fn add_req(user: &str, content: &str) -> AddRequest {
    AddRequest {
        user_id: user.to_string(),
        content: content.to_string(),
        tags: vec!["travel".to_string()],
        metadata: serde_json::Map::new(),
        sector_hint: None,
    }
}

#[tokio::test]
async fn add_then_query_finds_the_memory() {
    let (memory, query) = engines().await;
    let added = memory
        .add(add_req(
            "u1",
            "I went to Paris yesterday and saw the Eiffel Tower",
        ))
        .await
        .unwrap();
    assert!(matches!(
        added.primary_sector,
        Sector::Episodic | Sector::Semantic
    ));

    let hits = query
        .query(&QueryRequest {
            query: "Paris".into(),
            k: 5,
            sectors: None,
            user_id: "u1".into(),
            time_window_days: None,
            mode: QueryMode::Batch,
        })
        .await
        .unwrap();

    assert!(!hits.is_empty());
    let hit = hits.iter().find(|h| h.id == added.id).expect("added id present");
    assert!(hit.score > 0.0);
    assert!(hit.content.contains("Eiffel Tower"));
    assert!(hit.tags.contains(&"travel".to_string()));
}

#[tokio::test]
async fn add_is_idempotent_per_user_and_content() {
    let (memory, _) = engines().await;
    let first = memory.add(add_req("u1", "deduplicate me")).await.unwrap();
    let second = memory.add(add_req("u1", "deduplicate  me ")).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(!first.deduplicated);
    assert!(second.deduplicated);

    // Another user gets their own row for the same content.
    let other = memory.add(add_req("u2", "deduplicate me")).await.unwrap();
    assert_ne!(other.id, first.id);
}

#[tokio::test]
async fn empty_query_and_k_zero_return_empty() {
    let (memory, query) = engines().await;
    memory.add(add_req("u1", "some content")).await.unwrap();

    let req = QueryRequest {
        query: "".into(),
        k: 5,
        sectors: None,
        user_id: "u1".into(),
        time_window_days: None,
        mode: QueryMode::Batch,
    };
    assert!(query.query(&req).await.unwrap().is_empty());

    let req = QueryRequest {
        query: "content".into(),
        k: 0,
        ..req
    };
    assert!(query.query(&req).await.unwrap().is_empty());
}

#[tokio::test]
async fn queries_are_tenant_scoped() {
    let (memory, query) = engines().await;
    memory.add(add_req("user-a", "alpha confidential fact")).await.unwrap();

    let hits = query
        .query(&QueryRequest {
            query: "confidential".into(),
            k: 10,
            sectors: None,
            user_id: "user-b".into(),
            time_window_days: None,
            mode: QueryMode::Batch,
        })
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn delete_all_for_user_leaves_other_tenant_data() {
    let (memory, _) = engines().await;
    memory.add(add_req("user-a", "a one")).await.unwrap();
    memory.add(add_req("user-a", "a two")).await.unwrap();
    let b = memory.add(add_req("user-b", "b one")).await.unwrap();

    let removed = memory.delete_all_for_user("user-a").await.unwrap();
    assert_eq!(removed, 2);
    assert!(memory.list("user-a", None, 10, 0).await.unwrap().is_empty());
    assert_eq!(memory.get(&b.id, "user-b").await.unwrap().content, "b one");
}

#[tokio::test]
async fn reinforce_clamps_salience_and_touches_access_time() {
    let (memory, _) = engines().await;
    let added = memory.add(add_req("u1", "reinforce target")).await.unwrap();

    let s1 = memory.reinforce(&added.id, "u1", 0.4, false).await.unwrap();
    assert!(s1 <= 1.0);
    let s2 = memory.reinforce(&added.id, "u1", 0.9, false).await.unwrap();
    assert_eq!(s2, 1.0);

    let err = memory.reinforce("missing", "u1", 0.1, false).await.unwrap_err();
    assert!(matches!(err, OmError::NotFound { .. }));
}

#[tokio::test]
async fn update_reembeds_only_on_content_change() {
    let (memory, _) = engines().await;
    let added = memory.add(add_req("u1", "original content")).await.unwrap();

    // Tag-only update keeps the hash.
    let updated = memory
        .update(openmemory_engine::UpdateRequest {
            id: added.id.clone(),
            user_id: "u1".into(),
            content: None,
            tags: Some(vec!["new-tag".into()]),
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert!(updated.tags.contains("new-tag"));

    // Content update recomputes the hash.
    let updated = memory
        .update(openmemory_engine::UpdateRequest {
            id: added.id.clone(),
            user_id: "u1".into(),
            content: Some("revised content".into()),
            tags: None,
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.version, 3);
    assert_eq!(
        updated.content_hash,
        openmemory_core::hash::content_hash("revised content")
    );
}

#[tokio::test]
async fn ingest_maps_unsupported_and_oversized_payloads() {
    let (memory, _) = engines().await;

    let err = memory
        .ingest_document("u1", "application/octet-stream", b"\x00\x01\x02")
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 415);
    assert_eq!(err.code(), "unsupported_media_type");

    let oversized = vec![b'a'; 1_000_001];
    let err = memory
        .ingest_document("u1", "text/plain", &oversized)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 413);
    assert_eq!(err.code(), "file_too_large");
}

#[tokio::test]
async fn ingest_chunks_large_documents() {
    let (memory, _) = engines().await;
    let doc = (0..300)
        .map(|i| format!("distinct sentence number {i} about different things."))
        .collect::<Vec<_>>()
        .join(" ");
    let results = memory
        .ingest_document("u1", "text/plain", doc.as_bytes())
        .await
        .unwrap();
    assert!(results.len() > 1);
    let listed = memory.list("u1", None, 100, 0).await.unwrap();
    assert_eq!(listed.len(), results.len());
}

#[tokio::test]
async fn delete_cascade_flag_controls_fact_removal() {
    use openmemory_core::models::{FactQuery, TemporalFact};

    let (memory, _) = engines().await;
    let added = memory.add(add_req("u1", "cascade subject")).await.unwrap();

    // A fact referencing the memory id in its object.
    let store = memory.store().clone();
    let fact = TemporalFact::new("u1", "note", "references", &added.id, chrono::Utc::now());
    store
        .with_transaction(|tx| {
            let fact = fact.clone();
            Box::pin(async move { tx.insert_fact(&fact).await })
        })
        .await
        .unwrap();

    memory
        .delete(&added.id, "u1", DeleteOptions { cascade_facts: true })
        .await
        .unwrap();

    let facts = store.query_facts("u1", &FactQuery::default()).await.unwrap();
    assert!(facts.is_empty());
}

#[tokio::test]
async fn streaming_query_ends_with_done() {
    use futures::StreamExt;
    use openmemory_engine::QueryEvent;

    let (memory, query) = engines().await;
    memory.add(add_req("u1", "stream me a memory about Kyoto")).await.unwrap();

    let mut stream = query.query_stream(QueryRequest {
        query: "Kyoto".into(),
        k: 5,
        sectors: None,
        user_id: "u1".into(),
        time_window_days: None,
        mode: QueryMode::Stream,
    });

    let mut saw_memories = false;
    let mut saw_done = false;
    while let Some(event) = stream.next().await {
        match event {
            QueryEvent::Memories(batch) => {
                assert!(!batch.is_empty());
                saw_memories = true;
            }
            QueryEvent::Done => {
                saw_done = true;
                break;
            }
            QueryEvent::Error { message, .. } => panic!("stream error: {message}"),
        }
    }
    assert!(saw_memories);
    assert!(saw_done);
}
