//! The storage facade.
//!
//! `MemoryStore` owns one backend variant and exposes the named operation
//! surface. Callers never see which backend is active. Content encryption
//! happens here, at the row boundary: items go in as plaintext, are stored
//! as ciphertext, and come back decrypted.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;

use openmemory_core::models::{
    ApiKeyRecord, AuditRecord, FactQuery, MemoryItem, TemporalEdge, TemporalFact, VectorRecord,
    Waypoint,
};
use openmemory_core::{OmConfig, OmError, OmResult, Sector};
use openmemory_crypto::ContentCipher;

use crate::backup::{self, BackupInfo};
use crate::embedded::ops as eops;
use crate::embedded::EmbeddedBackend;
use crate::migrations;
use crate::remote::ops as rops;
use crate::remote::RemoteBackend;
use crate::sql::statements as st;
use crate::tenant::TenantGuard;

/// Tagged backend variants behind one surface.
pub enum Backend {
    Embedded(EmbeddedBackend),
    Remote(RemoteBackend),
}

/// Aggregate counters served to the dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub memories: i64,
    pub facts: i64,
    pub waypoints: i64,
    pub avg_salience: f64,
    pub sectors: Vec<(String, i64)>,
}

pub struct MemoryStore {
    backend: Backend,
    guard: Arc<TenantGuard>,
    cipher: Arc<ContentCipher>,
}

impl MemoryStore {
    /// Open the backend selected by configuration and bring the schema up
    /// to date.
    pub async fn open(config: &OmConfig, cipher: Arc<ContentCipher>) -> OmResult<Self> {
        let backend = match config.metadata_backend {
            openmemory_core::config::MetadataBackend::Embedded => {
                let embedded = EmbeddedBackend::open(&config.db_path)?;
                embedded
                    .writer
                    .with_conn_once(migrations::run_embedded)
                    .await?;
                Backend::Embedded(embedded)
            }
            openmemory_core::config::MetadataBackend::Remote => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    OmError::validation("DATABASE_URL is required for the remote backend")
                })?;
                let remote = RemoteBackend::connect(url)?;
                let client = remote.client().await?;
                migrations::run_remote(&client).await?;
                Backend::Remote(remote)
            }
        };
        let store = Self {
            backend,
            guard: Arc::new(TenantGuard::new(config.strict_tenant)),
            cipher,
        };
        store
            .record_key_version(store.cipher.registry().current_version())
            .await?;
        Ok(store)
    }

    /// In-memory embedded store for tests.
    pub async fn open_in_memory(strict: bool, cipher: Arc<ContentCipher>) -> OmResult<Self> {
        let embedded = EmbeddedBackend::open_in_memory()?;
        embedded
            .writer
            .with_conn_once(migrations::run_embedded)
            .await?;
        Ok(Self {
            backend: Backend::Embedded(embedded),
            guard: Arc::new(TenantGuard::new(strict)),
            cipher,
        })
    }

    /// On-disk embedded store for tests that need reader/writer separation.
    pub async fn open_at(path: &Path, strict: bool, cipher: Arc<ContentCipher>) -> OmResult<Self> {
        let embedded = EmbeddedBackend::open(path)?;
        embedded
            .writer
            .with_conn_once(migrations::run_embedded)
            .await?;
        Ok(Self {
            backend: Backend::Embedded(embedded),
            guard: Arc::new(TenantGuard::new(strict)),
            cipher,
        })
    }

    pub fn tenant_guard(&self) -> &TenantGuard {
        &self.guard
    }

    pub fn cipher(&self) -> &ContentCipher {
        &self.cipher
    }

    fn encrypt_item(&self, item: &MemoryItem) -> OmResult<MemoryItem> {
        encrypt_item(&self.cipher, item)
    }

    fn decrypt_item(&self, item: MemoryItem) -> OmResult<MemoryItem> {
        decrypt_item(&self.cipher, item)
    }

    // ── memory rows ──────────────────────────────────────────────────────

    pub async fn insert_memory(&self, item: &MemoryItem) -> OmResult<()> {
        self.guard.check(st::INSERT_MEMORY, Some(&item.user_id))?;
        let stored = self.encrypt_item(item)?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::memory::insert(c, &stored)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::insert(&client, &stored).await
            }
        }
    }

    /// Fetch a memory, enforcing user scope on the result.
    pub async fn get_memory(&self, id: &str, user_id: &str) -> OmResult<Option<MemoryItem>> {
        self.guard.check(st::GET_MEMORY, Some(user_id))?;
        let found = match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::memory::get(c, id)).await?,
            Backend::Remote(b) => {
                b.with_read_retries(|client| async move { rops::memory::get(&client, id).await })
                    .await?
            }
        };
        match found {
            Some(item) if item.user_id == user_id => Ok(Some(self.decrypt_item(item)?)),
            _ => Ok(None),
        }
    }

    pub async fn get_memory_by_hash(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> OmResult<Option<MemoryItem>> {
        self.guard.check(st::GET_MEMORY_BY_HASH, Some(user_id))?;
        let found = match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::memory::get_by_hash(c, user_id, content_hash))
                    .await?
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::get_by_hash(&client, user_id, content_hash).await?
            }
        };
        found.map(|item| self.decrypt_item(item)).transpose()
    }

    pub async fn list_memories_by_user(
        &self,
        user_id: &str,
        sector: Option<Sector>,
        limit: usize,
        offset: usize,
    ) -> OmResult<Vec<MemoryItem>> {
        self.guard.check(st::LIST_MEMORIES_BY_USER, Some(user_id))?;
        let items = match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::memory::list_by_user(c, user_id, sector, limit, offset))
                    .await?
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::list_by_user(&client, user_id, sector, limit, offset).await?
            }
        };
        items.into_iter().map(|i| self.decrypt_item(i)).collect()
    }

    pub async fn list_recent_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> OmResult<Vec<MemoryItem>> {
        self.guard.check(st::LIST_RECENT_MEMORIES, Some(user_id))?;
        let items = match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::memory::list_recent(c, user_id, limit)).await?
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::list_recent(&client, user_id, limit).await?
            }
        };
        items.into_iter().map(|i| self.decrypt_item(i)).collect()
    }

    pub async fn update_memory(&self, item: &MemoryItem) -> OmResult<()> {
        self.guard.check(st::UPDATE_MEMORY, Some(&item.user_id))?;
        let stored = self.encrypt_item(item)?;
        let rows = match &self.backend {
            Backend::Embedded(b) => {
                b.writer.with_conn(|c| eops::memory::update(c, &stored)).await?
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::update(&client, &stored).await?
            }
        };
        if rows == 0 {
            return Err(OmError::not_found("memory", &item.id));
        }
        Ok(())
    }

    pub async fn touch_memory(&self, id: &str, user_id: &str) -> OmResult<()> {
        self.guard.check(st::TOUCH_MEMORY, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::memory::touch(c, id, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::touch(&client, id, user_id).await
            }
        }
    }

    pub async fn count_memories_by_user(&self, user_id: &str) -> OmResult<i64> {
        self.guard.check(st::COUNT_MEMORIES_BY_USER, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::memory::count_by_user(c, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::count_by_user(&client, user_id).await
            }
        }
    }

    // ── vectors ──────────────────────────────────────────────────────────

    pub async fn insert_vector(&self, record: &VectorRecord) -> OmResult<()> {
        self.guard.check(st::INSERT_VECTOR, Some(&record.user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::vectors::insert(c, record)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::vectors::insert(&client, record).await
            }
        }
    }

    pub async fn get_vector(
        &self,
        memory_id: &str,
        sector: Sector,
        user_id: &str,
    ) -> OmResult<Option<VectorRecord>> {
        self.guard.check(st::GET_VECTOR, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::vectors::get(c, memory_id, sector, user_id)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::vectors::get(&client, memory_id, sector, user_id).await
            }
        }
    }

    pub async fn batch_get_vectors(
        &self,
        memory_ids: &[String],
        user_id: &str,
    ) -> OmResult<Vec<VectorRecord>> {
        self.guard.check(st::GET_VECTORS_BY_MEMORY, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::vectors::batch_get(c, memory_ids, user_id)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::vectors::batch_get(&client, memory_ids, user_id).await
            }
        }
    }

    /// Cursor-paged scan; pass the returned cursor back in to continue.
    pub async fn scan_vectors_by_sector(
        &self,
        user_id: &str,
        sector: Sector,
        cursor: Option<&str>,
        limit: usize,
    ) -> OmResult<(Vec<VectorRecord>, Option<String>)> {
        self.guard.check(st::SCAN_VECTORS_BY_SECTOR, Some(user_id))?;
        let cursor = cursor.unwrap_or("");
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::vectors::scan_by_sector(c, user_id, sector, cursor, limit))
                    .await
            }
            Backend::Remote(b) => {
                b.with_read_retries(|client| async move {
                    rops::vectors::scan_by_sector(&client, user_id, sector, cursor, limit).await
                })
                .await
            }
        }
    }

    // ── waypoints ────────────────────────────────────────────────────────

    pub async fn upsert_waypoint(&self, wp: &Waypoint) -> OmResult<()> {
        self.guard.check(st::UPSERT_WAYPOINT, Some(&wp.user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::waypoints::upsert(c, wp)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::waypoints::upsert(&client, wp).await
            }
        }
    }

    pub async fn neighbors_of(
        &self,
        src_id: &str,
        user_id: &str,
        limit: usize,
    ) -> OmResult<Vec<Waypoint>> {
        self.guard.check(st::NEIGHBORS_OF, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::waypoints::neighbors_of(c, src_id, user_id, limit)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::waypoints::neighbors_of(&client, src_id, user_id, limit).await
            }
        }
    }

    /// Reinforce one waypoint, clamping its weight to 1.0.
    pub async fn reinforce_waypoint(
        &self,
        src_id: &str,
        dst_id: &str,
        user_id: &str,
        boost: f64,
    ) -> OmResult<()> {
        self.guard.check(st::SET_WAYPOINT_WEIGHT, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer
                    .with_conn(|c| {
                        if let Some(w) = eops::waypoints::get_weight(c, src_id, dst_id, user_id)? {
                            eops::waypoints::set_weight(
                                c,
                                src_id,
                                dst_id,
                                user_id,
                                (w + boost).clamp(0.0, 1.0),
                            )?;
                        }
                        Ok(())
                    })
                    .await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                if let Some(w) =
                    rops::waypoints::get_weight(&client, src_id, dst_id, user_id).await?
                {
                    rops::waypoints::set_weight(
                        &client,
                        src_id,
                        dst_id,
                        user_id,
                        (w + boost).clamp(0.0, 1.0),
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    pub async fn decay_waypoints(&self, factor: f64, user_id: &str) -> OmResult<usize> {
        self.guard.check(st::DECAY_WAYPOINTS, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer.with_conn(|c| eops::waypoints::decay_all(c, factor, user_id)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::waypoints::decay_all(&client, factor, user_id).await
            }
        }
    }

    pub async fn delete_dangling_waypoints(&self) -> OmResult<usize> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(eops::waypoints::delete_dangling).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::waypoints::delete_dangling(&client).await
            }
        }
    }

    // ── temporal graph primitives ────────────────────────────────────────

    pub async fn query_facts(&self, user_id: &str, q: &FactQuery) -> OmResult<Vec<TemporalFact>> {
        self.guard.check(st::FIND_OPEN_FACT, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::temporal::query_facts(c, user_id, q)).await,
            Backend::Remote(b) => {
                b.with_read_retries(|client| async move {
                    rops::temporal::query_facts(&client, user_id, q).await
                })
                .await
            }
        }
    }

    pub async fn get_fact(&self, id: &str, user_id: &str) -> OmResult<Option<TemporalFact>> {
        self.guard.check(st::GET_FACT, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::temporal::get_fact(c, id, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::temporal::get_fact(&client, id, user_id).await
            }
        }
    }

    pub async fn merge_duplicate_facts(&self) -> OmResult<usize> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(eops::temporal::merge_duplicate_facts).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::temporal::merge_duplicate_facts(&client).await
            }
        }
    }

    // ── audit ────────────────────────────────────────────────────────────

    pub async fn insert_audit(&self, record: &AuditRecord) -> OmResult<()> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::audit::insert(c, record)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::audit::insert(&client, record).await
            }
        }
    }

    pub async fn list_audit(&self, user_id: &str, limit: usize) -> OmResult<Vec<AuditRecord>> {
        self.guard.check(st::LIST_AUDIT_BY_USER, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::audit::list_by_user(c, user_id, limit)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::audit::list_by_user(&client, user_id, limit).await
            }
        }
    }

    // ── rate limiting ────────────────────────────────────────────────────

    pub async fn rate_limit_bump(&self, key: &str, window_start: i64) -> OmResult<i64> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::rate::bump(c, key, window_start)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::rate::bump(&client, key, window_start).await
            }
        }
    }

    pub async fn prune_rate_windows(&self, horizon: i64) -> OmResult<usize> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::rate::prune(c, horizon)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::rate::prune(&client, horizon).await
            }
        }
    }

    // ── api keys ─────────────────────────────────────────────────────────

    pub async fn insert_api_key(&self, key: &ApiKeyRecord) -> OmResult<()> {
        self.guard.check(st::INSERT_API_KEY, Some(&key.user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::keys::insert(c, key)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::keys::insert(&client, key).await
            }
        }
    }

    pub async fn list_api_keys(&self, user_id: &str) -> OmResult<Vec<ApiKeyRecord>> {
        self.guard.check(st::LIST_API_KEYS, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::keys::list_by_user(c, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::keys::list_by_user(&client, user_id).await
            }
        }
    }

    pub async fn list_enabled_api_keys(&self) -> OmResult<Vec<ApiKeyRecord>> {
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(eops::keys::list_enabled).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::keys::list_enabled(&client).await
            }
        }
    }

    pub async fn touch_api_key(&self, hash: &str) -> OmResult<()> {
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::keys::touch(c, hash)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::keys::touch(&client, hash).await
            }
        }
    }

    pub async fn disable_api_key(&self, hash: &str) -> OmResult<()> {
        let n = match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::keys::disable(c, hash)).await?,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::keys::disable(&client, hash).await?
            }
        };
        if n == 0 {
            return Err(OmError::not_found("api key", hash));
        }
        Ok(())
    }

    // ── users ────────────────────────────────────────────────────────────

    pub async fn upsert_user_seen(&self, user_id: &str) -> OmResult<()> {
        self.guard.check(st::UPSERT_USER, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.writer.with_conn(|c| eops::users::upsert_seen(c, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::users::upsert_seen(&client, user_id).await
            }
        }
    }

    pub async fn get_user(&self, user_id: &str) -> OmResult<Option<eops::users::UserRow>> {
        self.guard.check(st::GET_USER, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::users::get(c, user_id)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::users::get(&client, user_id).await
            }
        }
    }

    pub async fn list_users(&self, limit: usize, offset: usize) -> OmResult<Vec<eops::users::UserRow>> {
        match &self.backend {
            Backend::Embedded(b) => b.with_reader(|c| eops::users::list(c, limit, offset)).await,
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::users::list(&client, limit, offset).await
            }
        }
    }

    pub async fn set_user_summary(&self, user_id: &str, summary: &str) -> OmResult<()> {
        self.guard.check(st::SET_USER_SUMMARY, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer.with_conn(|c| eops::users::set_summary(c, user_id, summary)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::users::set_summary(&client, user_id, summary).await
            }
        }
    }

    /// Record a declared encryption key version; called at open and by the
    /// rotation job so the registry of versions survives restarts.
    pub async fn record_key_version(&self, version: u32) -> OmResult<()> {
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer
                    .with_conn(|c| {
                        c.prepare_cached(st::INSERT_KEY_VERSION)
                            .map_err(|e| {
                                crate::embedded::write_conn::busy_to_storage(e, "key_version prepare")
                            })?
                            .execute(rusqlite::params![
                                version as i64,
                                crate::embedded::ts(Utc::now()),
                                0i64
                            ])
                            .map_err(|e| {
                                crate::embedded::write_conn::busy_to_storage(e, "key_version")
                            })?;
                        Ok(())
                    })
                    .await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                let sql = crate::remote::rq(st::INSERT_KEY_VERSION);
                let stmt = client
                    .prepare_cached(&sql)
                    .await
                    .map_err(|e| crate::remote::map_pg_err(e, "key_version prepare"))?;
                client
                    .execute(&stmt, &[&(version as i32), &Utc::now(), &false])
                    .await
                    .map_err(|e| crate::remote::map_pg_err(e, "key_version"))?;
                Ok(())
            }
        }
    }

    // ── maintenance scans (system scope) ─────────────────────────────────

    pub async fn scan_for_decay(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> OmResult<Vec<(String, String, f64, f64, chrono::DateTime<Utc>)>> {
        let cursor = cursor.unwrap_or("");
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::memory::scan_for_decay(c, cursor, limit)).await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::scan_for_decay(&client, cursor, limit).await
            }
        }
    }

    pub async fn apply_decay(
        &self,
        id: &str,
        user_id: &str,
        salience: f64,
        archived: bool,
    ) -> OmResult<()> {
        self.guard.check(st::APPLY_DECAY, Some(user_id))?;
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer
                    .with_conn(|c| eops::memory::apply_decay(c, id, user_id, salience, archived))
                    .await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::apply_decay(&client, id, user_id, salience, archived).await
            }
        }
    }

    /// Re-encrypt one batch of rows onto the current key version. Returns
    /// (rows rewritten, resume cursor).
    pub async fn rotate_key_batch(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> OmResult<(usize, Option<String>)> {
        let target = self.cipher.registry().current_version();
        let cursor = cursor.unwrap_or("");
        let batch = match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| eops::memory::scan_for_key_rotation(c, target, cursor, limit))
                    .await?
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                rops::memory::scan_for_key_rotation(&client, target, cursor, limit).await?
            }
        };

        let next = if batch.len() == limit {
            batch.last().map(|(id, _, _, _)| id.clone())
        } else {
            None
        };

        let mut rewritten = 0;
        for (id, user_id, ciphertext, old_version) in batch {
            let plaintext = self.cipher.decrypt(&ciphertext, old_version)?;
            let fresh = self.cipher.encrypt_with(&plaintext, target)?;
            match &self.backend {
                Backend::Embedded(b) => {
                    b.writer
                        .with_conn(|c| {
                            eops::memory::rewrite_content_key(c, &id, &user_id, &fresh, target)
                        })
                        .await?
                }
                Backend::Remote(b) => {
                    let client = b.client().await?;
                    rops::memory::rewrite_content_key(&client, &id, &user_id, &fresh, target)
                        .await?
                }
            }
            rewritten += 1;
        }
        Ok((rewritten, next))
    }

    // ── stats ────────────────────────────────────────────────────────────

    pub async fn dashboard_stats(&self) -> OmResult<DashboardStats> {
        match &self.backend {
            Backend::Embedded(b) => {
                b.with_reader(|c| {
                    Ok(DashboardStats {
                        users: eops::stats::count_users(c)?,
                        memories: eops::stats::count_memories(c)?,
                        facts: eops::stats::count_facts(c)?,
                        waypoints: eops::stats::count_waypoints(c)?,
                        avg_salience: eops::stats::avg_salience(c)?,
                        sectors: eops::stats::sector_histogram(c)?,
                    })
                })
                .await
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                Ok(DashboardStats {
                    users: rops::stats::count_users(&client).await?,
                    memories: rops::stats::count_memories(&client).await?,
                    facts: rops::stats::count_facts(&client).await?,
                    waypoints: rops::stats::count_waypoints(&client).await?,
                    avg_salience: rops::stats::avg_salience(&client).await?,
                    sectors: rops::stats::sector_histogram(&client).await?,
                })
            }
        }
    }

    // ── backup ───────────────────────────────────────────────────────────

    /// Page-copy snapshot of the embedded store. The remote backend
    /// delegates to the server's native tooling and reports accordingly.
    pub async fn create_backup(
        &self,
        dir: &Path,
        progress: impl FnMut(usize, usize) + Send,
    ) -> OmResult<std::path::PathBuf> {
        match &self.backend {
            Backend::Embedded(b) => {
                b.writer
                    .with_conn_once(|c| backup::create_backup(c, dir, progress))
                    .await
            }
            Backend::Remote(_) => Err(OmError::DependencyUnavailable {
                dependency: "page-copy backup".into(),
                reason: "remote backend delegates snapshots to the database server".into(),
            }),
        }
    }

    pub fn list_backups(&self, dir: &Path) -> OmResult<Vec<BackupInfo>> {
        backup::list_backups(dir)
    }

    pub fn prune_backups(&self, dir: &Path, keep: usize) -> OmResult<usize> {
        backup::prune_backups(dir, keep)
    }

    // ── transactions ─────────────────────────────────────────────────────

    /// Open a transaction. The embedded backend takes the writer lock for
    /// the transaction's lifetime; the remote backend pins one pooled
    /// connection. An abandoned `StoreTx` rolls back on drop.
    pub async fn begin(&self) -> OmResult<StoreTx> {
        let inner = match &self.backend {
            Backend::Embedded(b) => {
                let conn = b.writer.lock_owned().await;
                conn.execute_batch("BEGIN IMMEDIATE")
                    .map_err(|e| crate::embedded::map_sqlite_err(e, "begin"))?;
                TxInner::Embedded(EmbeddedTx {
                    conn,
                    finished: false,
                })
            }
            Backend::Remote(b) => {
                let client = b.client().await?;
                client
                    .batch_execute("BEGIN")
                    .await
                    .map_err(|e| crate::remote::map_pg_err(e, "begin"))?;
                TxInner::Remote(RemoteTx {
                    client: Some(client),
                    finished: false,
                })
            }
        };
        Ok(StoreTx {
            inner,
            cipher: self.cipher.clone(),
            guard: self.guard.clone(),
        })
    }

    /// Run `f` inside one transaction: commit on Ok, roll back on Err.
    ///
    /// Every statement in `f` runs on the transaction's connection. Nested
    /// transactions are rejected by construction: `StoreTx` exposes no
    /// transactional entry point.
    pub async fn with_transaction<T, F>(&self, f: F) -> OmResult<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut StoreTx) -> BoxFuture<'a, OmResult<T>> + Send,
    {
        let mut tx = self.begin().await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }
}

/// Embedded transaction state: exclusive ownership of the write connection
/// with an explicit BEGIN already issued.
struct EmbeddedTx {
    conn: tokio::sync::OwnedMutexGuard<rusqlite::Connection>,
    finished: bool,
}

impl Drop for EmbeddedTx {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

/// Remote transaction state: one pooled connection with an open BEGIN. An
/// abandoned transaction rolls back asynchronously so the open state never
/// returns to the pool.
struct RemoteTx {
    client: Option<deadpool_postgres::Client>,
    finished: bool,
}

impl Drop for RemoteTx {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(client) = self.client.take() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = client.batch_execute("ROLLBACK").await;
                    });
                }
            }
        }
    }
}

enum TxInner {
    Embedded(EmbeddedTx),
    Remote(RemoteTx),
}

/// Operation surface available inside a transaction. Same semantics as the
/// store-level methods, same tenant guard, same encryption boundary.
pub struct StoreTx {
    inner: TxInner,
    cipher: Arc<ContentCipher>,
    guard: Arc<TenantGuard>,
}

fn encrypt_item(cipher: &ContentCipher, item: &MemoryItem) -> OmResult<MemoryItem> {
    let mut stored = item.clone();
    let (ciphertext, key_version) = cipher.encrypt(&item.content)?;
    stored.content = ciphertext;
    stored.key_version = key_version;
    Ok(stored)
}

fn decrypt_item(cipher: &ContentCipher, mut item: MemoryItem) -> OmResult<MemoryItem> {
    item.content = cipher.decrypt(&item.content, item.key_version)?;
    Ok(item)
}

impl StoreTx {
    /// Commit the transaction, consuming it.
    pub async fn commit(mut self) -> OmResult<()> {
        match &mut self.inner {
            TxInner::Embedded(tx) => {
                tx.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| crate::embedded::map_sqlite_err(e, "commit"))?;
                tx.finished = true;
            }
            TxInner::Remote(tx) => {
                let client = tx.client.as_ref().expect("transaction client present");
                client
                    .batch_execute("COMMIT")
                    .await
                    .map_err(|e| crate::remote::map_pg_err(e, "commit"))?;
                tx.finished = true;
            }
        }
        Ok(())
    }

    /// Roll back the transaction, consuming it. Best-effort; failures are
    /// logged, and the drop path guarantees the connection never leaks an
    /// open transaction.
    pub async fn rollback(mut self) {
        match &mut self.inner {
            TxInner::Embedded(tx) => {
                if let Err(e) = tx.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %e, "rollback failed");
                }
                tx.finished = true;
            }
            TxInner::Remote(tx) => {
                let client = tx.client.as_ref().expect("transaction client present");
                match client.batch_execute("ROLLBACK").await {
                    Ok(()) => tx.finished = true,
                    Err(e) => {
                        // Leave `finished` false: drop discards the pinned
                        // connection instead of returning it dirty.
                        tracing::warn!(error = %e, "rollback failed, discarding connection");
                    }
                }
            }
        }
    }

    fn embedded(&self) -> Option<&rusqlite::Connection> {
        match &self.inner {
            TxInner::Embedded(tx) => Some(&tx.conn),
            TxInner::Remote(_) => None,
        }
    }

    fn remote(&self) -> Option<&deadpool_postgres::Client> {
        match &self.inner {
            TxInner::Remote(tx) => tx.client.as_ref(),
            TxInner::Embedded(_) => None,
        }
    }

    pub async fn insert_memory(&mut self, item: &MemoryItem) -> OmResult<()> {
        self.guard.check(st::INSERT_MEMORY, Some(&item.user_id))?;
        let stored = encrypt_item(&self.cipher, item)?;
        match self.embedded() {
            Some(conn) => eops::memory::insert(conn, &stored),
            None => rops::memory::insert(self.remote().expect("remote tx"), &stored).await,
        }
    }

    pub async fn update_memory(&mut self, item: &MemoryItem) -> OmResult<()> {
        self.guard.check(st::UPDATE_MEMORY, Some(&item.user_id))?;
        let stored = encrypt_item(&self.cipher, item)?;
        let rows = match self.embedded() {
            Some(conn) => eops::memory::update(conn, &stored)?,
            None => rops::memory::update(self.remote().expect("remote tx"), &stored).await?,
        };
        if rows == 0 {
            return Err(OmError::not_found("memory", &item.id));
        }
        Ok(())
    }

    pub async fn get_memory(&mut self, id: &str, user_id: &str) -> OmResult<Option<MemoryItem>> {
        self.guard.check(st::GET_MEMORY, Some(user_id))?;
        let found = match self.embedded() {
            Some(conn) => eops::memory::get(conn, id)?,
            None => rops::memory::get(self.remote().expect("remote tx"), id).await?,
        };
        match found {
            Some(item) if item.user_id == user_id => {
                Ok(Some(decrypt_item(&self.cipher, item)?))
            }
            _ => Ok(None),
        }
    }

    pub async fn get_memory_by_hash(
        &mut self,
        user_id: &str,
        content_hash: &str,
    ) -> OmResult<Option<MemoryItem>> {
        self.guard.check(st::GET_MEMORY_BY_HASH, Some(user_id))?;
        let found = match self.embedded() {
            Some(conn) => eops::memory::get_by_hash(conn, user_id, content_hash)?,
            None => {
                rops::memory::get_by_hash(self.remote().expect("remote tx"), user_id, content_hash)
                    .await?
            }
        };
        found.map(|item| decrypt_item(&self.cipher, item)).transpose()
    }

    pub async fn touch_memory(&mut self, id: &str, user_id: &str) -> OmResult<()> {
        self.guard.check(st::TOUCH_MEMORY, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::memory::touch(conn, id, user_id),
            None => rops::memory::touch(self.remote().expect("remote tx"), id, user_id).await,
        }
    }

    pub async fn get_salience(&mut self, id: &str, user_id: &str) -> OmResult<Option<f64>> {
        self.guard.check(st::GET_SALIENCE, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::memory::get_salience(conn, id, user_id),
            None => rops::memory::get_salience(self.remote().expect("remote tx"), id, user_id).await,
        }
    }

    pub async fn set_salience(&mut self, id: &str, user_id: &str, salience: f64) -> OmResult<()> {
        self.guard.check(st::SET_SALIENCE, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::memory::set_salience(conn, id, user_id, salience),
            None => {
                rops::memory::set_salience(self.remote().expect("remote tx"), id, user_id, salience)
                    .await
            }
        }
    }

    /// Delete the memory row plus its vectors and waypoints. Fact cascade is
    /// the caller's choice.
    pub async fn delete_memory(&mut self, id: &str, user_id: &str) -> OmResult<bool> {
        self.guard.check(st::DELETE_MEMORY, Some(user_id))?;
        match self.embedded() {
            Some(conn) => {
                eops::vectors::delete_by_memory(conn, id, user_id)?;
                eops::waypoints::delete_for_memory(conn, id, user_id)?;
                Ok(eops::memory::delete(conn, id, user_id)? > 0)
            }
            None => {
                let client = self.remote().expect("remote tx");
                rops::vectors::delete_by_memory(client, id, user_id).await?;
                rops::waypoints::delete_for_memory(client, id, user_id).await?;
                Ok(rops::memory::delete(client, id, user_id).await? > 0)
            }
        }
    }

    /// Bulk erase of one user's memories, vectors, waypoints, and profile.
    pub async fn delete_all_for_user(&mut self, user_id: &str) -> OmResult<usize> {
        self.guard.check(st::DELETE_MEMORIES_BY_USER, Some(user_id))?;
        match self.embedded() {
            Some(conn) => {
                eops::vectors::delete_by_user(conn, user_id)?;
                eops::waypoints::delete_by_user(conn, user_id)?;
                let n = eops::memory::delete_by_user(conn, user_id)?;
                eops::users::delete(conn, user_id)?;
                Ok(n)
            }
            None => {
                let client = self.remote().expect("remote tx");
                rops::vectors::delete_by_user(client, user_id).await?;
                rops::waypoints::delete_by_user(client, user_id).await?;
                let n = rops::memory::delete_by_user(client, user_id).await?;
                rops::users::delete(client, user_id).await?;
                Ok(n)
            }
        }
    }

    pub async fn insert_vector(&mut self, record: &VectorRecord) -> OmResult<()> {
        self.guard.check(st::INSERT_VECTOR, Some(&record.user_id))?;
        match self.embedded() {
            Some(conn) => eops::vectors::insert(conn, record),
            None => rops::vectors::insert(self.remote().expect("remote tx"), record).await,
        }
    }

    pub async fn upsert_waypoint(&mut self, wp: &Waypoint) -> OmResult<()> {
        self.guard.check(st::UPSERT_WAYPOINT, Some(&wp.user_id))?;
        match self.embedded() {
            Some(conn) => eops::waypoints::upsert(conn, wp),
            None => rops::waypoints::upsert(self.remote().expect("remote tx"), wp).await,
        }
    }

    pub async fn neighbors_of(
        &mut self,
        src_id: &str,
        user_id: &str,
        limit: usize,
    ) -> OmResult<Vec<Waypoint>> {
        self.guard.check(st::NEIGHBORS_OF, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::waypoints::neighbors_of(conn, src_id, user_id, limit),
            None => {
                rops::waypoints::neighbors_of(self.remote().expect("remote tx"), src_id, user_id, limit)
                    .await
            }
        }
    }

    pub async fn insert_fact(&mut self, fact: &TemporalFact) -> OmResult<()> {
        self.guard.check(st::INSERT_FACT, Some(&fact.user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::insert_fact(conn, fact),
            None => rops::temporal::insert_fact(self.remote().expect("remote tx"), fact).await,
        }
    }

    pub async fn find_open_fact(
        &mut self,
        user_id: &str,
        subject: &str,
        predicate: &str,
    ) -> OmResult<Option<TemporalFact>> {
        self.guard.check(st::FIND_OPEN_FACT, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::find_open(conn, user_id, subject, predicate),
            None => {
                rops::temporal::find_open(self.remote().expect("remote tx"), user_id, subject, predicate)
                    .await
            }
        }
    }

    pub async fn close_fact_interval(
        &mut self,
        fact_id: &str,
        user_id: &str,
        valid_to: chrono::DateTime<Utc>,
    ) -> OmResult<()> {
        self.guard.check(st::CLOSE_FACT_INTERVAL, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::close_interval(conn, fact_id, user_id, valid_to),
            None => {
                rops::temporal::close_interval(self.remote().expect("remote tx"), fact_id, user_id, valid_to)
                    .await
            }
        }
    }

    pub async fn get_fact(&mut self, id: &str, user_id: &str) -> OmResult<Option<TemporalFact>> {
        self.guard.check(st::GET_FACT, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::get_fact(conn, id, user_id),
            None => rops::temporal::get_fact(self.remote().expect("remote tx"), id, user_id).await,
        }
    }

    pub async fn insert_edge(&mut self, edge: &TemporalEdge) -> OmResult<()> {
        self.guard.check(st::INSERT_EDGE, Some(&edge.user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::insert_edge(conn, edge),
            None => rops::temporal::insert_edge(self.remote().expect("remote tx"), edge).await,
        }
    }

    pub async fn delete_facts_by_object(&mut self, user_id: &str, object: &str) -> OmResult<usize> {
        self.guard.check(st::DELETE_FACTS_BY_OBJECT, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::temporal::delete_facts_by_object(conn, user_id, object),
            None => {
                rops::temporal::delete_facts_by_object(self.remote().expect("remote tx"), user_id, object)
                    .await
            }
        }
    }

    pub async fn insert_audit(&mut self, record: &AuditRecord) -> OmResult<()> {
        match self.embedded() {
            Some(conn) => eops::audit::insert(conn, record),
            None => rops::audit::insert(self.remote().expect("remote tx"), record).await,
        }
    }

    pub async fn upsert_user_seen(&mut self, user_id: &str) -> OmResult<()> {
        self.guard.check(st::UPSERT_USER, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::users::upsert_seen(conn, user_id),
            None => rops::users::upsert_seen(self.remote().expect("remote tx"), user_id).await,
        }
    }

    pub async fn set_user_summary(&mut self, user_id: &str, summary: &str) -> OmResult<()> {
        self.guard.check(st::SET_USER_SUMMARY, Some(user_id))?;
        match self.embedded() {
            Some(conn) => eops::users::set_summary(conn, user_id, summary),
            None => {
                rops::users::set_summary(self.remote().expect("remote tx"), user_id, summary).await
            }
        }
    }
}
