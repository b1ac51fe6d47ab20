//! Hybrid retrieval: dense k-NN over cursor-paged candidate scans, a
//! keyword lexical boost, time-aware scoring, and optional streaming
//! delivery.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio_stream::wrappers::ReceiverStream;

use openmemory_core::models::{QueryHit, QueryRequest};
use openmemory_core::{ConfigHandle, OmResult, Sector};
use openmemory_embeddings::Embedder;
use openmemory_storage::MemoryStore;

/// Candidate page size for the vector scan.
const CANDIDATE_PAGE: usize = 256;

/// Waypoint boost gates: neighbor weight and candidate similarity floors.
const BOOST_MIN_WEIGHT: f64 = 0.4;
const BOOST_MIN_SIMILARITY: f64 = 0.35;
const BOOST_FACTOR: f64 = 0.05;

/// Streaming frame payloads.
#[derive(Debug, Clone)]
pub enum QueryEvent {
    Memories(Vec<QueryHit>),
    Done,
    Error { code: String, message: String },
}

#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<MemoryStore>,
    embedder: Arc<Embedder>,
    config: ConfigHandle,
}

/// Heap entry ordered by similarity.
struct Candidate {
    similarity: f64,
    memory_id: String,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.similarity == other.similarity
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.similarity
            .partial_cmp(&other.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl QueryEngine {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<Embedder>, config: ConfigHandle) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Batch query: full pipeline, top-k hits.
    pub async fn query(&self, req: &QueryRequest) -> OmResult<Vec<QueryHit>> {
        if req.k == 0 || req.query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(&req.query, None).await?;
        let sectors = self.requested_sectors(req);

        let mut hits = Vec::new();
        for sector in sectors {
            let sector_hits = self
                .sector_hits(req, sector, &query_vector)
                .await?;
            hits.extend(sector_hits);
        }

        self.apply_waypoint_boost(req, &mut hits).await?;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(req.k);
        Ok(hits)
    }

    /// Streaming query: one `Memories` frame per sector as its candidates
    /// clear the heap, then `Done`; `Error` replaces `Done` on failure.
    pub fn query_stream(&self, req: QueryRequest) -> ReceiverStream<QueryEvent> {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let engine = self.clone();
        tokio::spawn(async move {
            if req.k == 0 || req.query.trim().is_empty() {
                let _ = tx.send(QueryEvent::Done).await;
                return;
            }
            let query_vector = match engine.embedder.embed(&req.query, None).await {
                Ok(v) => v,
                Err(e) => {
                    let _ = tx
                        .send(QueryEvent::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut emitted: BTreeSet<String> = BTreeSet::new();
            for sector in engine.requested_sectors(&req) {
                match engine.sector_hits(&req, sector, &query_vector).await {
                    Ok(mut hits) => {
                        hits.retain(|h| emitted.insert(h.id.clone()));
                        hits.sort_by(|a, b| {
                            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
                        });
                        hits.truncate(req.k);
                        if !hits.is_empty() && tx.send(QueryEvent::Memories(hits)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(QueryEvent::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
            let _ = tx.send(QueryEvent::Done).await;
        });
        ReceiverStream::new(rx)
    }

    fn requested_sectors(&self, req: &QueryRequest) -> Vec<Sector> {
        match &req.sectors {
            Some(sectors) if !sectors.is_empty() => sectors.clone(),
            _ => Sector::ALL.to_vec(),
        }
    }

    /// Scan one sector's vectors, keep the k*oversample best by cosine in a
    /// bounded min-heap, then fuse scores over the survivors.
    async fn sector_hits(
        &self,
        req: &QueryRequest,
        sector: Sector,
        query_vector: &[f32],
    ) -> OmResult<Vec<QueryHit>> {
        let cfg = self.config.get();
        let retain = req.k.saturating_mul(cfg.oversample_factor).max(req.k);

        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(retain + 1);
        let mut cursor: Option<String> = None;
        loop {
            let (page, next) = self
                .store
                .scan_vectors_by_sector(&req.user_id, sector, cursor.as_deref(), CANDIDATE_PAGE)
                .await?;
            for record in page {
                let similarity = cosine(query_vector, &record.payload);
                heap.push(Reverse(Candidate {
                    similarity,
                    memory_id: record.memory_id,
                }));
                if heap.len() > retain {
                    heap.pop();
                }
            }
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        let keywords = keywords(&req.query, cfg.keyword_min_length);
        let now = Utc::now();
        let mut hits = Vec::with_capacity(heap.len());
        for Reverse(candidate) in heap.into_iter() {
            let Some(item) = self.store.get_memory(&candidate.memory_id, &req.user_id).await?
            else {
                continue;
            };
            if item.archived {
                continue;
            }
            if let Some(window_days) = req.time_window_days {
                let age_days = (now - item.created_at).num_seconds() as f64 / 86_400.0;
                if age_days > window_days {
                    continue;
                }
            }

            let score = if cfg.hybrid_fusion {
                let lexical = lexical_score(&item.content, &keywords);
                let age_days = (now - item.created_at).num_seconds() as f64 / 86_400.0;
                let recency = (-age_days / cfg.recency_half_life_days.max(f64::EPSILON)).exp();
                cfg.query_w_vec * candidate.similarity
                    + cfg.query_w_kw * lexical * cfg.keyword_boost
                    + cfg.query_w_time * recency
            } else {
                candidate.similarity
            };

            hits.push(QueryHit {
                id: item.id,
                content: item.content,
                score,
                primary_sector: item.primary_sector,
                tags: item.tags.into_iter().collect(),
                created_at: item.created_at,
                metadata: item.metadata,
            });
        }
        Ok(hits)
    }

    /// One-hop spreading activation: when the current best hit has strong
    /// neighbors that are themselves passable candidates, nudge them up.
    async fn apply_waypoint_boost(
        &self,
        req: &QueryRequest,
        hits: &mut [QueryHit],
    ) -> OmResult<()> {
        let Some(top) = hits
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        else {
            return Ok(());
        };
        let neighbors = self.store.neighbors_of(&top.id, &req.user_id, 16).await?;
        let strong: HashMap<String, f64> = neighbors
            .into_iter()
            .filter(|wp| wp.weight >= BOOST_MIN_WEIGHT)
            .map(|wp| (wp.dst_id, wp.weight))
            .collect();
        if strong.is_empty() {
            return Ok(());
        }
        for hit in hits.iter_mut() {
            if let Some(weight) = strong.get(&hit.id) {
                if hit.score >= BOOST_MIN_SIMILARITY {
                    hit.score += BOOST_FACTOR * weight;
                }
            }
        }
        Ok(())
    }
}

/// Cosine similarity in f64 over f32 payloads; zero vectors score zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Query keywords: lowercased, deduplicated tokens of at least `min_len`
/// characters.
fn keywords(query: &str, min_len: usize) -> BTreeSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= min_len)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Keyword hits in the content, normalized by content token count.
fn lexical_score(content: &str, keywords: &BTreeSet<String>) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let tokens: Vec<String> = content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens.iter().filter(|t| keywords.contains(*t)).count();
    hits as f64 / tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.5, 0.8];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_dimension_mismatch() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn keywords_are_lowercased_deduplicated_and_length_gated() {
        let set = keywords("The Paris PARIS to in trip", 3);
        assert!(set.contains("paris"));
        assert!(set.contains("the"));
        assert!(set.contains("trip"));
        assert!(!set.contains("to"));
        assert!(!set.contains("in"));
        assert_eq!(set.iter().filter(|k| *k == "paris").count(), 1);
    }

    #[test]
    fn lexical_score_normalizes_by_length() {
        let kws = keywords("paris", 3);
        let short = lexical_score("paris is lovely", &kws);
        let long = lexical_score(
            "paris is lovely and so are many other places with many words besides",
            &kws,
        );
        assert!(short > long);
    }
}
