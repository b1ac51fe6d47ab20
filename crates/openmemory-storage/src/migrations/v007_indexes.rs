//! v007: hot-path indexes. Partial where the planner can use them for
//! index-only scans; the vector extension install on the remote backend is
//! best-effort.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 7,
    name: "indexes",
    embedded: &[
        "
        CREATE INDEX IF NOT EXISTS idx_memories_user_created
            ON memories(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_memories_user_active
            ON memories(user_id, primary_sector) WHERE archived = 0;
        CREATE INDEX IF NOT EXISTS idx_memories_hash
            ON memories(user_id, content_hash);
        CREATE INDEX IF NOT EXISTS idx_vectors_user_sector
            ON vectors(user_id, sector, memory_id);
        CREATE INDEX IF NOT EXISTS idx_waypoints_src
            ON waypoints(src_id, user_id);
        CREATE INDEX IF NOT EXISTS idx_facts_subject
            ON temporal_facts(user_id, subject, predicate);
        CREATE INDEX IF NOT EXISTS idx_facts_open
            ON temporal_facts(user_id, subject, predicate) WHERE valid_to IS NULL;
        CREATE INDEX IF NOT EXISTS idx_audit_user_time
            ON audit_log(user_id, timestamp);
        ",
    ],
    remote: &[
        "
        CREATE INDEX IF NOT EXISTS idx_om_memories_user_created
            ON om_memories(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_om_memories_user_active
            ON om_memories(user_id, primary_sector) WHERE archived = FALSE;
        CREATE INDEX IF NOT EXISTS idx_om_memories_hash
            ON om_memories(user_id, content_hash);
        CREATE INDEX IF NOT EXISTS idx_om_vectors_user_sector
            ON om_vectors(user_id, sector, memory_id);
        CREATE INDEX IF NOT EXISTS idx_om_waypoints_src
            ON om_waypoints(src_id, user_id);
        CREATE INDEX IF NOT EXISTS idx_om_facts_subject
            ON om_temporal_facts(user_id, subject, predicate);
        CREATE INDEX IF NOT EXISTS idx_om_facts_open
            ON om_temporal_facts(user_id, subject, predicate) WHERE valid_to IS NULL;
        CREATE INDEX IF NOT EXISTS idx_om_audit_user_time
            ON om_audit_log(user_id, timestamp);
        ",
    ],
    remote_optional: &["CREATE EXTENSION IF NOT EXISTS vector;"],
};
