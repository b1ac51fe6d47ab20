//! Integration tests: storage invariants over the embedded backend.

use std::sync::Arc;

use openmemory_core::models::{FactQuery, MemoryItem, TemporalFact, VectorRecord, Waypoint};
use openmemory_core::{OmError, Sector};
use openmemory_crypto::{ContentCipher, KeyRegistry};
use openmemory_storage::MemoryStore;

fn cipher() -> Arc<ContentCipher> {
    Arc::new(ContentCipher::new(Arc::new(KeyRegistry::new(1, [9u8; 32]))))
}

async fn store() -> MemoryStore {
    MemoryStore::open_in_memory(false, cipher()).await.unwrap()
}

fn item(user: &str, content: &str) -> MemoryItem {
    MemoryItem::new(user, content, Sector::Semantic)
}

#[tokio::test]
async fn insert_get_round_trips_plaintext() {
    let store = store().await;
    let m = item("u1", "the capital of France is Paris");
    store.insert_memory(&m).await.unwrap();

    let got = store.get_memory(&m.id, "u1").await.unwrap().expect("present");
    assert_eq!(got.content, "the capital of France is Paris");
    assert_eq!(got.version, 1);
    assert_eq!(got.key_version, 1);
}

#[tokio::test]
async fn content_is_ciphertext_at_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("at-rest.db");
    let store = MemoryStore::open_at(&path, false, cipher()).await.unwrap();
    let m = item("u1", "very private thought");
    store.insert_memory(&m).await.unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    let stored: String = raw
        .query_row("SELECT content FROM memories WHERE id = ?1", [&m.id], |r| r.get(0))
        .unwrap();
    assert_ne!(stored, "very private thought");
    assert!(!stored.contains("private"));
}

#[tokio::test]
async fn tenant_isolation_on_reads() {
    let store = store().await;
    let m = item("user-a", "alpha secret");
    store.insert_memory(&m).await.unwrap();

    assert!(store.get_memory(&m.id, "user-b").await.unwrap().is_none());
    assert!(store
        .list_memories_by_user("user-b", None, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn duplicate_hash_is_a_conflict() {
    let store = store().await;
    let m = item("u1", "identical");
    store.insert_memory(&m).await.unwrap();
    let mut dup = item("u1", "identical");
    dup.id = "other-id".into();
    let err = store.insert_memory(&dup).await.unwrap_err();
    assert!(matches!(err, OmError::Conflict { .. }));
}

#[tokio::test]
async fn version_increases_on_update() {
    let store = store().await;
    let mut m = item("u1", "first draft");
    store.insert_memory(&m).await.unwrap();

    m.content = "second draft".into();
    m.content_hash = openmemory_core::hash::content_hash(&m.content);
    store.update_memory(&m).await.unwrap();

    let got = store.get_memory(&m.id, "u1").await.unwrap().unwrap();
    assert_eq!(got.version, 2);
    assert_eq!(got.content, "second draft");
}

#[tokio::test]
async fn vector_dimensions_round_trip() {
    let store = store().await;
    let m = item("u1", "vector host");
    store.insert_memory(&m).await.unwrap();

    let payload: Vec<f32> = (0..256).map(|i| i as f32 / 256.0).collect();
    let v = VectorRecord::new(&m.id, Sector::Semantic, "u1", payload.clone());
    store.insert_vector(&v).await.unwrap();

    let got = store
        .get_vector(&m.id, Sector::Semantic, "u1")
        .await
        .unwrap()
        .expect("vector present");
    assert_eq!(got.dim, 256);
    assert_eq!(got.payload, payload);
}

#[tokio::test]
async fn vector_scan_pages_by_cursor() {
    let store = store().await;
    for i in 0..7 {
        let m = item("u1", &format!("memory number {i}"));
        store.insert_memory(&m).await.unwrap();
        let v = VectorRecord::new(&m.id, Sector::Semantic, "u1", vec![i as f32; 4]);
        store.insert_vector(&v).await.unwrap();
    }

    let mut seen = 0;
    let mut cursor: Option<String> = None;
    loop {
        let (page, next) = store
            .scan_vectors_by_sector("u1", Sector::Semantic, cursor.as_deref(), 3)
            .await
            .unwrap();
        seen += page.len();
        match next {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }
    assert_eq!(seen, 7);
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let store = store().await;
    let m = item("u1", "will not survive");
    let mid = m.id.clone();

    let result: Result<(), OmError> = store
        .with_transaction(|tx| {
            let m = m.clone();
            Box::pin(async move {
                tx.insert_memory(&m).await?;
                Err(OmError::validation("forced failure"))
            })
        })
        .await;
    assert!(result.is_err());
    assert!(store.get_memory(&mid, "u1").await.unwrap().is_none());
}

#[tokio::test]
async fn transaction_commits_all_or_nothing() {
    let store = store().await;
    let m = item("u1", "atomic bundle");
    let v = VectorRecord::new(&m.id, Sector::Semantic, "u1", vec![0.5; 8]);
    let wp = Waypoint::new(&m.id, "existing", "u1", 0.3);

    store
        .with_transaction(|tx| {
            let (m, v, wp) = (m.clone(), v.clone(), wp.clone());
            Box::pin(async move {
                tx.insert_memory(&m).await?;
                tx.insert_vector(&v).await?;
                tx.upsert_waypoint(&wp).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    assert!(store.get_memory(&m.id, "u1").await.unwrap().is_some());
    assert!(store
        .get_vector(&m.id, Sector::Semantic, "u1")
        .await
        .unwrap()
        .is_some());
    assert_eq!(store.neighbors_of(&m.id, "u1", 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn strict_mode_rejects_unscoped_destructive_ops() {
    let store = MemoryStore::open_in_memory(true, cipher()).await.unwrap();
    let err = store
        .with_transaction(|tx| Box::pin(async move { tx.delete_all_for_user("").await }))
        .await
        .unwrap_err();
    assert!(matches!(err, OmError::TenantScope { .. }));
}

#[tokio::test]
async fn delete_all_for_user_leaves_other_tenants_alone() {
    let store = store().await;
    let a = item("user-a", "a's memory");
    let b = item("user-b", "b's memory");
    store.insert_memory(&a).await.unwrap();
    store.insert_memory(&b).await.unwrap();

    let removed = store
        .with_transaction(|tx| Box::pin(async move { tx.delete_all_for_user("user-a").await }))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert!(store
        .list_memories_by_user("user-a", None, 10, 0)
        .await
        .unwrap()
        .is_empty());
    let left = store.list_memories_by_user("user-b", None, 10, 0).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].content, "b's memory");
}

#[tokio::test]
async fn fact_query_as_of_honors_intervals() {
    use chrono::TimeZone;
    let store = store().await;
    let t2020 = chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let t2023 = chrono::Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();

    let mut acme = TemporalFact::new("u1", "alice", "works_at", "Acme", t2020);
    acme.valid_to = Some(t2023);
    let globex = TemporalFact::new("u1", "alice", "works_at", "Globex", t2023);

    store
        .with_transaction(|tx| {
            let (acme, globex) = (acme.clone(), globex.clone());
            Box::pin(async move {
                tx.insert_fact(&acme).await?;
                tx.insert_fact(&globex).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let as_of = chrono::Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    let facts = store
        .query_facts(
            "u1",
            &FactQuery {
                subject: Some("alice".into()),
                as_of: Some(as_of),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].object, "Acme");
    assert_eq!(facts[0].valid_to, Some(t2023));
}

#[tokio::test]
async fn rate_limit_counts_per_window() {
    let store = store().await;
    for expected in 1..=5 {
        let n = store.rate_limit_bump("key-1", 1000).await.unwrap();
        assert_eq!(n, expected);
    }
    // A different window starts fresh.
    assert_eq!(store.rate_limit_bump("key-1", 2000).await.unwrap(), 1);
}

#[tokio::test]
async fn key_rotation_rewrites_rows() {
    let registry = Arc::new(KeyRegistry::new(1, [1u8; 32]));
    let cipher = Arc::new(ContentCipher::new(registry.clone()));
    let store = MemoryStore::open_in_memory(false, cipher).await.unwrap();

    let m = item("u1", "rotate me");
    store.insert_memory(&m).await.unwrap();

    registry.install(2, [2u8; 32]).unwrap();
    let (rewritten, next) = store.rotate_key_batch(None, 10).await.unwrap();
    assert_eq!(rewritten, 1);
    assert!(next.is_none());

    let got = store.get_memory(&m.id, "u1").await.unwrap().unwrap();
    assert_eq!(got.content, "rotate me");
    assert_eq!(got.key_version, 2);
}
