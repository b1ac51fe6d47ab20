//! Embedded single-file backend.
//!
//! One write connection behind a lock, a small round-robin read pool, WAL
//! journaling, busy retry with jitter.

pub mod ops;
pub mod pragmas;
pub mod read_pool;
pub mod rows;
pub mod write_conn;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use openmemory_core::{OmError, OmResult};

pub use read_pool::ReadPool;
pub use write_conn::WriteConn;

/// The embedded backend: writer + readers + the file path (None when
/// in-memory).
pub struct EmbeddedBackend {
    pub writer: WriteConn,
    pub readers: ReadPool,
    pub db_path: Option<PathBuf>,
    /// In-memory databases are private to their connection, so reads must
    /// go through the writer there.
    use_read_pool: bool,
}

impl EmbeddedBackend {
    pub fn open(path: &Path) -> OmResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OmError::storage(format!("create data dir: {e}")))?;
        }
        let writer = WriteConn::open(path)?;
        let readers = ReadPool::open(path, ReadPool::default_size())?;
        Ok(Self {
            writer,
            readers,
            db_path: Some(path.to_path_buf()),
            use_read_pool: true,
        })
    }

    /// In-memory backend for tests. All traffic goes through the writer.
    pub fn open_in_memory() -> OmResult<Self> {
        let writer = WriteConn::open_in_memory()?;
        let readers = ReadPool::open_in_memory(1)?;
        Ok(Self {
            writer,
            readers,
            db_path: None,
            use_read_pool: false,
        })
    }

    /// Run a read-only closure on the best available connection.
    pub async fn with_reader<F, T>(&self, f: F) -> OmResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> OmResult<T>,
    {
        if self.use_read_pool {
            self.readers.with_conn(f)
        } else {
            self.writer.with_conn_once(f).await
        }
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so that lexicographic
/// comparison matches chronological order.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> OmResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OmError::storage(format!("parse timestamp '{s}': {e}")))
}

/// Map a rusqlite failure into the workspace taxonomy. Constraint
/// violations become conflicts; everything else is an opaque storage error.
pub fn map_sqlite_err(e: rusqlite::Error, ctx: &str) -> OmError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if inner.code == rusqlite::ErrorCode::ConstraintViolation {
            return OmError::conflict(format!("{ctx}: constraint violation"));
        }
    }
    OmError::storage(format!("{ctx}: {e}"))
}

/// Whether an error is a transient busy/locked condition worth retrying.
pub fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_fixed_width_and_ordered() {
        let a = ts(Utc::now());
        let b = ts(Utc::now() + chrono::Duration::seconds(1));
        assert!(a < b);
        assert!(a.ends_with('Z'));
        assert_eq!(parse_ts(&a).unwrap(), parse_ts(&a).unwrap());
    }
}
