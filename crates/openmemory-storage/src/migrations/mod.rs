//! Ordered, versioned migrations with one SQL sequence per dialect.
//!
//! Applied at startup under an advisory lock; each completed version is
//! recorded in schema_migrations, so re-running is a no-op.

mod v001_core_tables;
mod v002_graph_tables;
mod v003_auth_audit;
mod v004_profile_tables;
mod v005_encryption_columns;
mod v006_waypoint_pk_rebuild;
mod v007_indexes;

use rusqlite::Connection;

use openmemory_core::{OmError, OmResult};

use crate::embedded::ts;
use crate::embedded::write_conn::busy_to_storage;
use crate::sql::statements as st;

/// One schema step. `remote_optional` statements are executed best-effort
/// (used for extension installs the server may not permit).
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub embedded: &'static [&'static str],
    pub remote: &'static [&'static str],
    pub remote_optional: &'static [&'static str],
}

/// Every migration, ascending. Append-only: released versions never change.
pub fn all() -> &'static [Migration] {
    &[
        v001_core_tables::MIGRATION,
        v002_graph_tables::MIGRATION,
        v003_auth_audit::MIGRATION,
        v004_profile_tables::MIGRATION,
        v005_encryption_columns::MIGRATION,
        v006_waypoint_pk_rebuild::MIGRATION,
        v007_indexes::MIGRATION,
    ]
}

const BOOTSTRAP_EMBEDDED: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    applied_at  TEXT NOT NULL
)";

const BOOTSTRAP_REMOTE: &str = "CREATE TABLE IF NOT EXISTS om_schema_migrations (
    version     BIGINT PRIMARY KEY,
    name        TEXT NOT NULL,
    applied_at  TIMESTAMPTZ NOT NULL
)";

/// Advisory lock key for remote migration runs; any stable value shared by
/// all writers works.
const REMOTE_LOCK_KEY: i64 = 0x6f6d5f6d69677261; // "om_migra"

/// Run pending migrations on the embedded backend. The whole run happens
/// inside one immediate transaction, which doubles as the advisory lock.
pub fn run_embedded(conn: &Connection) -> OmResult<()> {
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| busy_to_storage(e, "migrations begin"))?;

    let result = (|| -> OmResult<()> {
        conn.execute_batch(BOOTSTRAP_EMBEDDED)
            .map_err(|e| busy_to_storage(e, "migrations bootstrap"))?;

        let applied = applied_versions_embedded(conn)?;
        for migration in all() {
            if applied.contains(&migration.version) {
                continue;
            }
            tracing::info!(version = migration.version, name = migration.name, "applying migration");
            for sql in migration.embedded {
                conn.execute_batch(sql).map_err(|e| {
                    OmError::storage(format!(
                        "migration v{} '{}': {e}",
                        migration.version, migration.name
                    ))
                })?;
            }
            conn.prepare_cached(st::RECORD_MIGRATION)
                .map_err(|e| busy_to_storage(e, "record migration prepare"))?
                .execute(rusqlite::params![
                    migration.version,
                    migration.name,
                    ts(chrono::Utc::now())
                ])
                .map_err(|e| busy_to_storage(e, "record migration"))?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => conn
            .execute_batch("COMMIT")
            .map_err(|e| busy_to_storage(e, "migrations commit")),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

fn applied_versions_embedded(conn: &Connection) -> OmResult<Vec<i64>> {
    let mut stmt = conn
        .prepare(st::APPLIED_MIGRATIONS)
        .map_err(|e| busy_to_storage(e, "applied versions prepare"))?;
    let versions = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| busy_to_storage(e, "applied versions"))?
        .collect::<Result<Vec<i64>, _>>()
        .map_err(|e| busy_to_storage(e, "applied versions row"))?;
    Ok(versions)
}

/// Run pending migrations on the remote backend under pg_advisory_lock.
pub async fn run_remote(client: &deadpool_postgres::Client) -> OmResult<()> {
    client
        .execute("SELECT pg_advisory_lock($1)", &[&REMOTE_LOCK_KEY])
        .await
        .map_err(|e| OmError::storage(format!("acquire migration lock: {e}")))?;

    let result = run_remote_locked(client).await;

    // Release regardless of outcome.
    let _ = client
        .execute("SELECT pg_advisory_unlock($1)", &[&REMOTE_LOCK_KEY])
        .await;
    result
}

async fn run_remote_locked(client: &deadpool_postgres::Client) -> OmResult<()> {
    client
        .batch_execute(BOOTSTRAP_REMOTE)
        .await
        .map_err(|e| OmError::storage(format!("migrations bootstrap: {e}")))?;

    let rows = client
        .query("SELECT version FROM om_schema_migrations ORDER BY version", &[])
        .await
        .map_err(|e| OmError::storage(format!("applied versions: {e}")))?;
    let applied: Vec<i64> = rows.iter().map(|r| r.get(0)).collect();

    for migration in all() {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(version = migration.version, name = migration.name, "applying migration");
        for sql in migration.remote {
            client.batch_execute(sql).await.map_err(|e| {
                OmError::storage(format!(
                    "migration v{} '{}': {e}",
                    migration.version, migration.name
                ))
            })?;
        }
        for sql in migration.remote_optional {
            if let Err(e) = client.batch_execute(sql).await {
                tracing::warn!(
                    version = migration.version,
                    error = %e,
                    "optional migration statement skipped"
                );
            }
        }
        client
            .execute(
                "INSERT INTO om_schema_migrations (version, name, applied_at) VALUES ($1, $2, $3)",
                &[&migration.version, &migration.name, &chrono::Utc::now()],
            )
            .await
            .map_err(|e| OmError::storage(format!("record migration: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_ascending() {
        let versions: Vec<i64> = all().iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn migrate_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run_embedded(&conn).unwrap();
        run_embedded(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, all().len() as i64);

        // Core tables all exist after the run.
        for table in [
            "memories",
            "vectors",
            "waypoints",
            "temporal_facts",
            "temporal_edges",
        ] {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "missing table {table}");
        }
    }

    #[test]
    fn waypoint_pk_includes_user_after_rebuild() {
        let conn = Connection::open_in_memory().unwrap();
        run_embedded(&conn).unwrap();
        conn.execute(
            "INSERT INTO waypoints (src_id, dst_id, user_id, weight, created_at, updated_at)
             VALUES ('a', 'b', 'u1', 0.5, '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        // Same pair for another tenant must not collide.
        conn.execute(
            "INSERT INTO waypoints (src_id, dst_id, user_id, weight, created_at, updated_at)
             VALUES ('a', 'b', 'u2', 0.5, '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
    }
}
