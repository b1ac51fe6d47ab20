//! Environment-derived configuration.
//!
//! The process environment is mapped once at startup into a typed record;
//! every field has a default. `ConfigHandle::reload` rebuilds the record
//! atomically so long-lived components pick up changes through the handle.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::errors::{OmError, OmResult};

/// Deployment mode; controls the advertised protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn protocol(&self) -> &'static str {
        match self {
            Mode::Development => "http",
            Mode::Production => "https",
        }
    }
}

/// Which storage backend owns the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Embedded,
    Remote,
}

/// Which embedding provider family to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedKind {
    Synthetic,
    LocalDaemon,
    RemoteApi,
    Router,
}

/// Embedding pipeline mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Simple,
    Advanced,
}

/// The full configuration record. Built once from the environment and
/// shared as an immutable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmConfig {
    pub port: u16,
    pub mode: Mode,
    pub host: String,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub metadata_backend: MetadataBackend,
    /// Connection string for the remote backend.
    pub database_url: Option<String>,

    pub embed_kind: EmbedKind,
    pub embed_mode: EmbedMode,
    pub vec_dim: usize,
    pub embed_daemon_url: String,
    pub embed_api_url: Option<String>,
    pub embed_api_key: Option<String>,
    pub embed_model: String,
    pub embed_timeout_ms: u64,

    pub hybrid_fusion: bool,
    pub keyword_boost: f64,
    pub keyword_min_length: usize,
    pub query_w_vec: f64,
    pub query_w_kw: f64,
    pub query_w_time: f64,
    pub recency_half_life_days: f64,
    pub oversample_factor: usize,
    pub waypoint_top_k: usize,

    pub rate_limit_enabled: bool,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u64,

    pub decay_interval_minutes: u64,
    pub decay_ratio: f64,
    pub archival_floor: f64,
    pub auto_reflect: bool,
    pub reflect_min: usize,

    pub max_payload_size: usize,
    pub chunk_chars: usize,
    pub strict_tenant: bool,

    pub api_key: Option<String>,
    pub admin_key: Option<String>,

    pub backup_dir: PathBuf,
    pub backup_retention: usize,

    /// Base64-encoded 32-byte master key; generated ephemeral when unset.
    pub encryption_key: Option<String>,
    pub encryption_key_version: u32,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env(key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        None => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl OmConfig {
    /// Build a configuration record from the process environment.
    pub fn from_env() -> OmResult<Self> {
        let data_dir = PathBuf::from(env("DATA_DIR").unwrap_or_else(|| "./data".into()));
        let db_path = env("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("openmemory.db"));
        let backup_dir = env("BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("backups"));

        let mode = match env("MODE").as_deref() {
            Some("production") => Mode::Production,
            Some("development") | None => Mode::Development,
            Some(other) => {
                return Err(OmError::validation(format!("unknown MODE '{other}'")));
            }
        };

        let metadata_backend = match env("METADATA_BACKEND").as_deref() {
            Some("remote") => MetadataBackend::Remote,
            Some("embedded") | None => MetadataBackend::Embedded,
            Some(other) => {
                return Err(OmError::validation(format!(
                    "unknown METADATA_BACKEND '{other}'"
                )));
            }
        };

        let embed_kind = match env("EMBED_KIND").as_deref() {
            Some("local_daemon") => EmbedKind::LocalDaemon,
            Some("remote_api") => EmbedKind::RemoteApi,
            Some("router") => EmbedKind::Router,
            Some("synthetic") | None => EmbedKind::Synthetic,
            Some(other) => {
                return Err(OmError::validation(format!("unknown EMBED_KIND '{other}'")));
            }
        };

        let embed_mode = match env("EMBED_MODE").as_deref() {
            Some("advanced") => EmbedMode::Advanced,
            _ => EmbedMode::Simple,
        };

        Ok(Self {
            port: env_parse("PORT", 8080),
            mode,
            host: env("HOST").unwrap_or_else(|| "127.0.0.1".into()),
            data_dir,
            db_path,
            metadata_backend,
            database_url: env("DATABASE_URL"),

            embed_kind,
            embed_mode,
            vec_dim: env_parse("VEC_DIM", 256),
            embed_daemon_url: env("EMBED_DAEMON_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".into()),
            embed_api_url: env("EMBED_API_URL"),
            embed_api_key: env("EMBED_API_KEY"),
            embed_model: env("EMBED_MODEL").unwrap_or_else(|| "nomic-embed-text".into()),
            embed_timeout_ms: env_parse("EMBED_TIMEOUT_MS", 8_000),

            hybrid_fusion: env_bool("HYBRID_FUSION", true),
            keyword_boost: env_parse("KEYWORD_BOOST", 1.0),
            keyword_min_length: env_parse("KEYWORD_MIN_LENGTH", 3),
            query_w_vec: env_parse("QUERY_W_VEC", 0.7),
            query_w_kw: env_parse("QUERY_W_KW", 0.2),
            query_w_time: env_parse("QUERY_W_TIME", 0.1),
            recency_half_life_days: env_parse("RECENCY_HALF_LIFE_DAYS", 7.0),
            oversample_factor: env_parse("OVERSAMPLE_FACTOR", 4),
            waypoint_top_k: env_parse("WAYPOINT_TOP_K", 5),

            rate_limit_enabled: env_bool("RATE_LIMIT_ENABLED", true),
            rate_limit_window_ms: env_parse("RATE_LIMIT_WINDOW_MS", 60_000),
            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 100),

            decay_interval_minutes: env_parse("DECAY_INTERVAL_MINUTES", 1440),
            decay_ratio: env_parse("DECAY_RATIO", 0.5),
            archival_floor: env_parse("ARCHIVAL_FLOOR", 0.05),
            auto_reflect: env_bool("AUTO_REFLECT", true),
            reflect_min: env_parse("REFLECT_MIN", 20),

            max_payload_size: env_parse("MAX_PAYLOAD_SIZE", 1_000_000),
            chunk_chars: env_parse("CHUNK_CHARS", 1_200),
            strict_tenant: env_bool("STRICT_TENANT", false),

            api_key: env("API_KEY"),
            admin_key: env("ADMIN_KEY"),

            backup_dir,
            backup_retention: env_parse("BACKUP_RETENTION", 5),

            encryption_key: env("ENCRYPTION_KEY"),
            encryption_key_version: env_parse("ENCRYPTION_KEY_VERSION", 1),
        })
    }
}

/// Shared handle to the live configuration snapshot.
///
/// Reads are a cheap `Arc` clone; `reload` swaps the snapshot atomically.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<OmConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: OmConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn from_env() -> OmResult<Self> {
        Ok(Self::new(OmConfig::from_env()?))
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<OmConfig> {
        self.inner.read().expect("config lock poisoned").clone()
    }

    /// Rebuild the record from the environment and swap it in.
    pub fn reload(&self) -> OmResult<Arc<OmConfig>> {
        let fresh = Arc::new(OmConfig::from_env()?);
        *self.inner.write().expect("config lock poisoned") = fresh.clone();
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = OmConfig::from_env().unwrap();
        assert_eq!(cfg.vec_dim, 256);
        assert_eq!(cfg.rate_limit_max_requests, 100);
        assert_eq!(cfg.keyword_min_length, 3);
        assert!(cfg.hybrid_fusion);
        assert_eq!(cfg.mode.protocol(), "http");
    }

    #[test]
    fn reload_swaps_snapshot() {
        let handle = ConfigHandle::from_env().unwrap();
        let before = handle.get();
        let after = handle.reload().unwrap();
        assert_eq!(before.vec_dim, after.vec_dim);
    }
}
