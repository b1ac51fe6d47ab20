//! The memory engine: CRUD orchestration over embedding, classification,
//! vector persistence, waypoints, and audit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use openmemory_core::models::{AuditRecord, MemoryItem, VectorRecord, Waypoint};
use openmemory_core::{hash, ConfigHandle, OmError, OmResult, Sector};
use openmemory_embeddings::synthetic::Synthetic;
use openmemory_embeddings::Embedder;
use openmemory_storage::MemoryStore;

use crate::chunk::chunk_text;
use crate::classify::classify;

/// Similarity floor below which no waypoint is created on add.
const WAYPOINT_MIN_SIMILARITY: f64 = 0.3;

/// Fraction of the reinforcement boost propagated to depth-1 neighbors.
const NEIGHBOR_BOOST_RATIO: f64 = 0.3;

/// Candidate page size when looking for waypoint targets.
const WAYPOINT_SCAN_PAGE: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub user_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Map<String, Value>,
    pub sector_hint: Option<Sector>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AddResult {
    pub id: String,
    pub primary_sector: Sector,
    pub deduplicated: bool,
    pub embedding_fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub id: String,
    pub user_id: String,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Also remove temporal facts whose object references the deleted
    /// memory. Off unless the caller asks.
    pub cascade_facts: bool,
}

pub struct MemoryEngine {
    store: Arc<MemoryStore>,
    embedder: Arc<Embedder>,
    config: ConfigHandle,
}

impl MemoryEngine {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<Embedder>, config: ConfigHandle) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Add a memory. Duplicate (user, content) ingests are idempotent: the
    /// existing id comes back and only last_accessed_at moves.
    pub async fn add(&self, req: AddRequest) -> OmResult<AddResult> {
        let content = req.content.trim();
        if content.is_empty() {
            return Err(OmError::validation("content must not be empty"));
        }
        if req.user_id.is_empty() {
            return Err(OmError::validation("user_id must not be empty"));
        }
        let cfg = self.config.get();

        let content_hash = hash::content_hash(content);
        if let Some(existing) = self
            .store
            .get_memory_by_hash(&req.user_id, &content_hash)
            .await?
        {
            self.store.touch_memory(&existing.id, &req.user_id).await?;
            return Ok(AddResult {
                id: existing.id,
                primary_sector: existing.primary_sector,
                deduplicated: true,
                embedding_fallback: false,
            });
        }

        let sector = classify(content, req.sector_hint);
        let (vector, fallback) = self.embed_bounded(content, sector, &cfg).await;

        let mut item = MemoryItem::new(&req.user_id, content, sector);
        item.tags = req.tags.into_iter().collect::<BTreeSet<_>>();
        item.metadata = req.metadata;
        if fallback {
            item.metadata
                .insert("embedding_fallback".into(), Value::Bool(true));
        }

        let record = VectorRecord::new(&item.id, sector, &req.user_id, vector.clone());
        let neighbors = self
            .closest_memories(&req.user_id, sector, &vector, cfg.waypoint_top_k)
            .await?;

        let audit = AuditRecord::new("memory.add", "memory")
            .for_user(&req.user_id)
            .on_resource(&item.id)
            .with_metadata(serde_json::json!({ "sector": sector.as_str() }));

        let result = AddResult {
            id: item.id.clone(),
            primary_sector: sector,
            deduplicated: false,
            embedding_fallback: fallback,
        };

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    tx.upsert_user_seen(&item.user_id).await?;
                    tx.insert_memory(&item).await?;
                    tx.insert_vector(&record).await?;
                    for (neighbor_id, similarity) in &neighbors {
                        let weight = (similarity * 0.5).clamp(0.05, 1.0);
                        tx.upsert_waypoint(&Waypoint::new(
                            &item.id,
                            neighbor_id,
                            &item.user_id,
                            weight,
                        ))
                        .await?;
                    }
                    tx.insert_audit(&audit).await?;
                    Ok(())
                })
            })
            .await?;

        Ok(result)
    }

    /// Embed with the configured deadline; on expiry or provider failure the
    /// synthetic fallback fills in and the caller marks the item.
    async fn embed_bounded(
        &self,
        content: &str,
        sector: Sector,
        cfg: &openmemory_core::OmConfig,
    ) -> (Vec<f32>, bool) {
        let budget = Duration::from_millis(cfg.embed_timeout_ms);
        match tokio::time::timeout(budget, self.embedder.embed_full(content, Some(sector))).await {
            Ok(Ok(output)) => (output.vector, output.fallback),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "embedding failed, using synthetic fallback");
                (Synthetic::new(cfg.vec_dim).embed(content), true)
            }
            Err(_) => {
                tracing::warn!(budget_ms = cfg.embed_timeout_ms, "embedding timed out, using synthetic fallback");
                (Synthetic::new(cfg.vec_dim).embed(content), true)
            }
        }
    }

    /// Top-k most similar existing memories in the sector, by brute-force
    /// cosine over cursor-paged vector scans.
    async fn closest_memories(
        &self,
        user_id: &str,
        sector: Sector,
        query: &[f32],
        k: usize,
    ) -> OmResult<Vec<(String, f64)>> {
        let mut best: Vec<(String, f64)> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (page, next) = self
                .store
                .scan_vectors_by_sector(user_id, sector, cursor.as_deref(), WAYPOINT_SCAN_PAGE)
                .await?;
            for record in page {
                let sim = crate::query::cosine(query, &record.payload);
                if sim >= WAYPOINT_MIN_SIMILARITY {
                    best.push((record.memory_id, sim));
                }
            }
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        best.truncate(k);
        Ok(best)
    }

    /// Fetch one memory, touching last_accessed_at.
    pub async fn get(&self, id: &str, user_id: &str) -> OmResult<MemoryItem> {
        let item = self
            .store
            .get_memory(id, user_id)
            .await?
            .ok_or_else(|| OmError::not_found("memory", id))?;
        self.store.touch_memory(id, user_id).await?;
        Ok(item)
    }

    pub async fn list(
        &self,
        user_id: &str,
        sector: Option<Sector>,
        limit: usize,
        offset: usize,
    ) -> OmResult<Vec<MemoryItem>> {
        self.store
            .list_memories_by_user(user_id, sector, limit, offset)
            .await
    }

    /// Update content, tags, or metadata. Content changes recompute the
    /// hash and re-embed; metadata/tag changes do not touch the vector.
    pub async fn update(&self, req: UpdateRequest) -> OmResult<MemoryItem> {
        let mut item = self
            .store
            .get_memory(&req.id, &req.user_id)
            .await?
            .ok_or_else(|| OmError::not_found("memory", &req.id))?;

        let content_changed = match &req.content {
            Some(new_content) => {
                let trimmed = new_content.trim();
                if trimmed.is_empty() {
                    return Err(OmError::validation("content must not be empty"));
                }
                let changed = hash::content_hash(trimmed) != item.content_hash;
                if changed {
                    item.content = trimmed.to_string();
                    item.content_hash = hash::content_hash(trimmed);
                }
                changed
            }
            None => false,
        };
        if let Some(tags) = req.tags {
            item.tags = tags.into_iter().collect();
        }
        if let Some(metadata) = req.metadata {
            item.metadata = metadata;
        }
        item.updated_at = Utc::now();
        item.last_accessed_at = Utc::now();

        let cfg = self.config.get();
        let new_vector = if content_changed {
            let sector = item.primary_sector;
            let (vector, fallback) = self.embed_bounded(&item.content, sector, &cfg).await;
            if fallback {
                item.metadata
                    .insert("embedding_fallback".into(), Value::Bool(true));
            } else {
                item.metadata.remove("embedding_fallback");
            }
            Some(VectorRecord::new(&item.id, sector, &item.user_id, vector))
        } else {
            None
        };

        let audit = AuditRecord::new("memory.update", "memory")
            .for_user(&req.user_id)
            .on_resource(&req.id)
            .with_metadata(serde_json::json!({ "content_changed": content_changed }));

        let stored = item.clone();
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    tx.update_memory(&stored).await?;
                    if let Some(vector) = &new_vector {
                        tx.insert_vector(vector).await?;
                    }
                    tx.insert_audit(&audit).await?;
                    Ok(())
                })
            })
            .await?;

        // The row-level counter moved under us; reflect it.
        item.version += 1;
        Ok(item)
    }

    /// Delete a memory with cascades to vectors and waypoints; fact cascade
    /// only when requested.
    pub async fn delete(&self, id: &str, user_id: &str, opts: DeleteOptions) -> OmResult<()> {
        let item = self
            .store
            .get_memory(id, user_id)
            .await?
            .ok_or_else(|| OmError::not_found("memory", id))?;

        let audit = AuditRecord::new("memory.delete", "memory")
            .for_user(user_id)
            .on_resource(id)
            .with_metadata(serde_json::json!({ "cascade_facts": opts.cascade_facts }));

        let id = id.to_string();
        let user = user_id.to_string();
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let existed = tx.delete_memory(&id, &user).await?;
                    if !existed {
                        return Err(OmError::not_found("memory", &id));
                    }
                    if opts.cascade_facts {
                        tx.delete_facts_by_object(&user, &id).await?;
                        tx.delete_facts_by_object(&user, &item.content_hash).await?;
                    }
                    tx.insert_audit(&audit).await?;
                    Ok(())
                })
            })
            .await
    }

    /// Bulk delete of every row a user owns.
    pub async fn delete_all_for_user(&self, user_id: &str) -> OmResult<usize> {
        let audit = AuditRecord::new("memory.delete_all", "user").for_user(user_id);
        let user = user_id.to_string();
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let removed = tx.delete_all_for_user(&user).await?;
                    tx.insert_audit(&audit).await?;
                    Ok(removed)
                })
            })
            .await
    }

    /// Boost salience (clamped to 1.0), touch last access, and propagate a
    /// reduced boost one hop along outgoing waypoints.
    pub async fn reinforce(
        &self,
        id: &str,
        user_id: &str,
        boost: f64,
        propagate: bool,
    ) -> OmResult<f64> {
        if !(0.0..=1.0).contains(&boost) {
            return Err(OmError::validation("boost must be within [0, 1]"));
        }
        let audit = AuditRecord::new("memory.reinforce", "memory")
            .for_user(user_id)
            .on_resource(id)
            .with_metadata(serde_json::json!({ "boost": boost }));

        let id_owned = id.to_string();
        let user = user_id.to_string();
        let (updated, touched) = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let salience = tx
                        .get_salience(&id_owned, &user)
                        .await?
                        .ok_or_else(|| OmError::not_found("memory", &id_owned))?;
                    let updated = (salience + boost).clamp(0.0, 1.0);
                    tx.set_salience(&id_owned, &user, updated).await?;
                    tx.touch_memory(&id_owned, &user).await?;

                    let mut touched = Vec::new();
                    if propagate {
                        let neighbor_boost = boost * NEIGHBOR_BOOST_RATIO;
                        for wp in tx.neighbors_of(&id_owned, &user, 8).await? {
                            if let Some(s) = tx.get_salience(&wp.dst_id, &user).await? {
                                tx.set_salience(
                                    &wp.dst_id,
                                    &user,
                                    (s + neighbor_boost * wp.weight).clamp(0.0, 1.0),
                                )
                                .await?;
                                touched.push(wp.dst_id.clone());
                            }
                        }
                    }

                    tx.insert_audit(&audit).await?;
                    Ok((updated, touched))
                })
            })
            .await?;

        // Strengthen the traversed edges once the salience writes commit.
        let waypoint_boost = boost * NEIGHBOR_BOOST_RATIO;
        for dst in touched {
            self.store
                .reinforce_waypoint(id, &dst, user_id, waypoint_boost)
                .await?;
        }
        Ok(updated)
    }

    /// Ingest an extracted-or-plain document: size gate, text extraction by
    /// content type, chunking, one add per chunk.
    pub async fn ingest_document(
        &self,
        user_id: &str,
        content_type: &str,
        data: &[u8],
    ) -> OmResult<Vec<AddResult>> {
        let cfg = self.config.get();
        if data.len() > cfg.max_payload_size {
            return Err(OmError::FileTooLarge {
                size: data.len(),
                limit: cfg.max_payload_size,
            });
        }

        let text = extract_text(content_type, data)?;
        let chunks = chunk_text(&text, cfg.chunk_chars);
        if chunks.is_empty() {
            return Err(OmError::validation("document contained no extractable text"));
        }

        let mut results = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut metadata = serde_json::Map::new();
            metadata.insert("source".into(), Value::String("ingest".into()));
            metadata.insert("chunk_index".into(), Value::Number(index.into()));
            metadata.insert("content_type".into(), Value::String(content_type.into()));
            results.push(
                self.add(AddRequest {
                    user_id: user_id.to_string(),
                    content: chunk,
                    tags: Vec::new(),
                    metadata,
                    sector_hint: None,
                })
                .await?,
            );
        }
        Ok(results)
    }
}

/// Inline extraction for the text-bearing content types; anything else is
/// the document extractor's job and unsupported here.
fn extract_text(content_type: &str, data: &[u8]) -> OmResult<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "text/plain" | "text/markdown" | "text/csv" => String::from_utf8(data.to_vec())
            .map_err(|_| OmError::validation("document is not valid UTF-8")),
        "application/json" => {
            let value: Value = serde_json::from_slice(data)
                .map_err(|_| OmError::validation("document is not valid JSON"))?;
            let mut out = String::new();
            collect_json_strings(&value, &mut out);
            Ok(out)
        }
        other => Err(OmError::UnsupportedContentType {
            content_type: other.to_string(),
        }),
    }
}

fn collect_json_strings(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(s);
        }
        Value::Array(items) => items.iter().for_each(|v| collect_json_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_json_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octet_stream_is_unsupported() {
        let err = extract_text("application/octet-stream", b"\x00\x01").unwrap_err();
        assert!(matches!(err, OmError::UnsupportedContentType { .. }));
        assert_eq!(err.http_status(), 415);
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let text = extract_text("text/plain; charset=utf-8", b"hello").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn json_extraction_collects_string_leaves() {
        let doc = br#"{"title": "trip", "notes": ["saw the tower", "ate well"], "n": 4}"#;
        let text = extract_text("application/json", doc).unwrap();
        assert!(text.contains("saw the tower"));
        assert!(text.contains("ate well"));
    }
}
