//! The single write connection.
//!
//! WAL allows one writer at a time; this wrapper serializes writers behind
//! an async lock and retries transient busy errors with jittered backoff.
//! Transactions take the lock guard by value so they can be held across
//! await points.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rusqlite::Connection;
use tokio::sync::{Mutex, OwnedMutexGuard};

use openmemory_core::OmResult;

use super::pragmas::apply_pragmas;
use super::{is_busy, map_sqlite_err};

/// Total budget for busy retries, on top of the connection's busy_timeout.
const BUSY_RETRY_BUDGET: Duration = Duration::from_millis(2_000);

pub struct WriteConn {
    conn: Arc<Mutex<Connection>>,
}

impl WriteConn {
    pub fn open(path: &Path) -> OmResult<Self> {
        let conn = Connection::open(path).map_err(|e| map_sqlite_err(e, "open database"))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> OmResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| map_sqlite_err(e, "open in-memory"))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure on the write connection, retrying busy errors with
    /// jitter for a bounded time.
    pub async fn with_conn<F, T>(&self, f: F) -> OmResult<T>
    where
        F: Fn(&Connection) -> OmResult<T>,
    {
        let guard = self.conn.lock().await;
        let mut elapsed = Duration::ZERO;
        loop {
            match f(&guard) {
                Err(openmemory_core::OmError::Storage { message })
                    if message.contains("database is locked") || message.contains("busy") =>
                {
                    if elapsed >= BUSY_RETRY_BUDGET {
                        return Err(openmemory_core::OmError::storage(message));
                    }
                    let jitter = rand::thread_rng().gen_range(20..80);
                    let pause = Duration::from_millis(jitter);
                    elapsed += pause;
                    tokio::time::sleep(pause).await;
                }
                other => return other,
            }
        }
    }

    /// Take exclusive ownership of the connection for a transaction's
    /// lifetime. All other writers queue on the lock until the guard drops.
    pub async fn lock_owned(&self) -> OwnedMutexGuard<Connection> {
        self.conn.clone().lock_owned().await
    }

    /// Run a closure once without the retry loop (used for reads routed
    /// through the writer and for migrations, which manage their own error
    /// handling).
    pub async fn with_conn_once<F, T>(&self, f: F) -> OmResult<T>
    where
        F: FnOnce(&Connection) -> OmResult<T>,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }
}

/// Classify a raw sqlite error for retry purposes before it is mapped.
pub fn busy_to_storage(e: rusqlite::Error, ctx: &str) -> openmemory_core::OmError {
    if is_busy(&e) {
        openmemory_core::OmError::storage(format!("{ctx}: database is locked"))
    } else {
        map_sqlite_err(e, ctx)
    }
}
