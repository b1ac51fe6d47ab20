//! The named statement set shared by both backends.
//!
//! Everything is written in embedded (`?`) style; the remote backend passes
//! each statement through `for_remote` to number the placeholders and prefix
//! the table names.

/// Tables subject to remote-dialect prefixing.
pub const TABLES: &[&str] = &[
    "memories",
    "vectors",
    "waypoints",
    "temporal_facts",
    "temporal_edges",
    "webhooks",
    "webhook_logs",
    "audit_log",
    "rate_limits",
    "api_keys",
    "users",
    "config_kv",
    "feature_flags",
    "encryption_keys",
    "schema_migrations",
];

pub const MEMORY_COLUMNS: &str = "id, user_id, content, content_hash, primary_sector, tags, \
     metadata, created_at, updated_at, last_accessed_at, salience, decay_rate, version, \
     key_version, archived";

pub const INSERT_MEMORY: &str = "INSERT INTO memories (id, user_id, content, content_hash, \
     primary_sector, tags, metadata, created_at, updated_at, last_accessed_at, salience, \
     decay_rate, version, key_version, archived) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

pub const GET_MEMORY: &str =
    "SELECT id, user_id, content, content_hash, primary_sector, tags, metadata, created_at, \
     updated_at, last_accessed_at, salience, decay_rate, version, key_version, archived \
     FROM memories WHERE id = ?";

pub const GET_MEMORY_BY_HASH: &str =
    "SELECT id, user_id, content, content_hash, primary_sector, tags, metadata, created_at, \
     updated_at, last_accessed_at, salience, decay_rate, version, key_version, archived \
     FROM memories WHERE user_id = ? AND content_hash = ?";

pub const LIST_MEMORIES_BY_USER: &str =
    "SELECT id, user_id, content, content_hash, primary_sector, tags, metadata, created_at, \
     updated_at, last_accessed_at, salience, decay_rate, version, key_version, archived \
     FROM memories WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?";

pub const LIST_MEMORIES_BY_USER_SECTOR: &str =
    "SELECT id, user_id, content, content_hash, primary_sector, tags, metadata, created_at, \
     updated_at, last_accessed_at, salience, decay_rate, version, key_version, archived \
     FROM memories WHERE user_id = ? AND primary_sector = ? \
     ORDER BY created_at DESC LIMIT ? OFFSET ?";

pub const LIST_RECENT_MEMORIES: &str =
    "SELECT id, user_id, content, content_hash, primary_sector, tags, metadata, created_at, \
     updated_at, last_accessed_at, salience, decay_rate, version, key_version, archived \
     FROM memories WHERE user_id = ? AND archived = ? ORDER BY created_at DESC LIMIT ?";

pub const UPDATE_MEMORY: &str = "UPDATE memories SET content = ?, content_hash = ?, \
     primary_sector = ?, tags = ?, metadata = ?, updated_at = ?, last_accessed_at = ?, \
     salience = ?, decay_rate = ?, version = version + 1, key_version = ?, archived = ? \
     WHERE id = ? AND user_id = ?";

pub const TOUCH_MEMORY: &str =
    "UPDATE memories SET last_accessed_at = ? WHERE id = ? AND user_id = ?";

pub const GET_SALIENCE: &str =
    "SELECT salience FROM memories WHERE id = ? AND user_id = ?";

pub const SET_SALIENCE: &str = "UPDATE memories SET salience = ?, last_accessed_at = ?, \
     version = version + 1 WHERE id = ? AND user_id = ?";

pub const DELETE_MEMORY: &str = "DELETE FROM memories WHERE id = ? AND user_id = ?";

pub const DELETE_MEMORIES_BY_USER: &str = "DELETE FROM memories WHERE user_id = ?";

pub const COUNT_MEMORIES_BY_USER: &str =
    "SELECT COUNT(*) FROM memories WHERE user_id = ?";

pub const SCAN_MEMORIES_FOR_DECAY: &str =
    "SELECT id, user_id, salience, decay_rate, last_accessed_at FROM memories \
     WHERE archived = ? AND id > ? ORDER BY id LIMIT ?";

pub const APPLY_DECAY: &str =
    "UPDATE memories SET salience = ?, archived = ?, version = version + 1 \
     WHERE id = ? AND user_id = ?";

pub const SCAN_FOR_KEY_ROTATION: &str =
    "SELECT id, user_id, content, key_version FROM memories \
     WHERE key_version < ? AND id > ? ORDER BY id LIMIT ?";

pub const REWRITE_CONTENT_KEY: &str =
    "UPDATE memories SET content = ?, key_version = ? WHERE id = ? AND user_id = ?";

pub const INSERT_VECTOR: &str =
    "INSERT INTO vectors (memory_id, sector, user_id, payload, dim) VALUES (?, ?, ?, ?, ?) \
     ON CONFLICT (memory_id, sector, user_id) DO UPDATE SET payload = excluded.payload, \
     dim = excluded.dim";

pub const GET_VECTOR: &str =
    "SELECT memory_id, sector, user_id, payload, dim FROM vectors \
     WHERE memory_id = ? AND sector = ? AND user_id = ?";

pub const GET_VECTORS_BY_MEMORY: &str =
    "SELECT memory_id, sector, user_id, payload, dim FROM vectors \
     WHERE memory_id = ? AND user_id = ?";

pub const SCAN_VECTORS_BY_SECTOR: &str =
    "SELECT memory_id, sector, user_id, payload, dim FROM vectors \
     WHERE user_id = ? AND sector = ? AND memory_id > ? ORDER BY memory_id LIMIT ?";

pub const DELETE_VECTORS_BY_MEMORY: &str =
    "DELETE FROM vectors WHERE memory_id = ? AND user_id = ?";

pub const DELETE_VECTORS_BY_USER: &str = "DELETE FROM vectors WHERE user_id = ?";

pub const UPSERT_WAYPOINT: &str =
    "INSERT INTO waypoints (src_id, dst_id, user_id, weight, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?) \
     ON CONFLICT (src_id, dst_id, user_id) DO UPDATE SET weight = excluded.weight, \
     updated_at = excluded.updated_at";

pub const NEIGHBORS_OF: &str =
    "SELECT src_id, dst_id, user_id, weight, created_at, updated_at FROM waypoints \
     WHERE src_id = ? AND user_id = ? ORDER BY weight DESC LIMIT ?";

pub const GET_WAYPOINT_WEIGHT: &str =
    "SELECT weight FROM waypoints WHERE src_id = ? AND dst_id = ? AND user_id = ?";

pub const SET_WAYPOINT_WEIGHT: &str =
    "UPDATE waypoints SET weight = ?, updated_at = ? \
     WHERE src_id = ? AND dst_id = ? AND user_id = ?";

pub const DECAY_WAYPOINTS: &str =
    "UPDATE waypoints SET weight = weight * ? WHERE user_id = ?";

pub const DELETE_WAYPOINTS_FOR_MEMORY: &str =
    "DELETE FROM waypoints WHERE (src_id = ? OR dst_id = ?) AND user_id = ?";

pub const DELETE_WAYPOINTS_BY_USER: &str = "DELETE FROM waypoints WHERE user_id = ?";

pub const DELETE_DANGLING_WAYPOINTS: &str =
    "DELETE FROM waypoints WHERE src_id NOT IN (SELECT id FROM memories) \
     OR dst_id NOT IN (SELECT id FROM memories)";

pub const FACT_COLUMNS: &str = "id, user_id, subject, predicate, object, valid_from, valid_to, \
     confidence, last_updated, metadata";

pub const INSERT_FACT: &str = "INSERT INTO temporal_facts (id, user_id, subject, predicate, \
     object, valid_from, valid_to, confidence, last_updated, metadata) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

pub const FIND_OPEN_FACT: &str =
    "SELECT id, user_id, subject, predicate, object, valid_from, valid_to, confidence, \
     last_updated, metadata FROM temporal_facts \
     WHERE user_id = ? AND subject = ? AND predicate = ? AND valid_to IS NULL";

pub const CLOSE_FACT_INTERVAL: &str =
    "UPDATE temporal_facts SET valid_to = ?, last_updated = ? WHERE id = ? AND user_id = ?";

pub const GET_FACT: &str =
    "SELECT id, user_id, subject, predicate, object, valid_from, valid_to, confidence, \
     last_updated, metadata FROM temporal_facts WHERE id = ? AND user_id = ?";

pub const DELETE_FACTS_BY_OBJECT: &str =
    "DELETE FROM temporal_facts WHERE user_id = ? AND object = ?";

pub const INSERT_EDGE: &str = "INSERT INTO temporal_edges (id, user_id, source_fact, \
     target_fact, relation_type, valid_from, valid_to, weight, metadata) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Keeps the earliest row of each duplicate group. `COALESCE(valid_to,
/// valid_from)` keeps open and closed intervals in separate groups without
/// mixing types across dialects.
pub const MERGE_DUPLICATE_FACTS: &str = "DELETE FROM temporal_facts WHERE id NOT IN ( \
     SELECT MIN(id) FROM temporal_facts \
     GROUP BY user_id, subject, predicate, object, COALESCE(valid_to, valid_from))";

pub const INSERT_AUDIT: &str = "INSERT INTO audit_log (id, user_id, action, resource_type, \
     resource_id, ip, ua, metadata, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

pub const LIST_AUDIT_BY_USER: &str =
    "SELECT id, user_id, action, resource_type, resource_id, ip, ua, metadata, timestamp \
     FROM audit_log WHERE user_id = ? ORDER BY timestamp DESC LIMIT ?";

pub const RATE_LIMIT_BUMP: &str =
    "INSERT INTO rate_limits (rl_key, window_start, hits) VALUES (?, ?, 1) \
     ON CONFLICT (rl_key, window_start) DO UPDATE SET hits = rate_limits.hits + 1 \
     RETURNING hits";

pub const PRUNE_RATE_WINDOWS: &str = "DELETE FROM rate_limits WHERE window_start < ?";

pub const INSERT_API_KEY: &str = "INSERT INTO api_keys (hash, user_id, scopes, created_at, \
     last_used_at, disabled) VALUES (?, ?, ?, ?, ?, ?)";

pub const LIST_API_KEYS: &str =
    "SELECT hash, user_id, scopes, created_at, last_used_at, disabled FROM api_keys \
     WHERE user_id = ?";

pub const LIST_ALL_API_KEYS: &str =
    "SELECT hash, user_id, scopes, created_at, last_used_at, disabled FROM api_keys \
     WHERE disabled = ?";

pub const TOUCH_API_KEY: &str = "UPDATE api_keys SET last_used_at = ? WHERE hash = ?";

pub const DISABLE_API_KEY: &str = "UPDATE api_keys SET disabled = ? WHERE hash = ?";

pub const UPSERT_USER: &str = "INSERT INTO users (user_id, summary, reflection_count, \
     created_at, last_seen_at) VALUES (?, NULL, 0, ?, ?) \
     ON CONFLICT (user_id) DO UPDATE SET last_seen_at = excluded.last_seen_at";

pub const GET_USER: &str =
    "SELECT user_id, summary, reflection_count, created_at, last_seen_at FROM users \
     WHERE user_id = ?";

pub const LIST_USERS: &str =
    "SELECT user_id, summary, reflection_count, created_at, last_seen_at FROM users \
     ORDER BY user_id LIMIT ? OFFSET ?";

pub const SET_USER_SUMMARY: &str =
    "UPDATE users SET summary = ?, reflection_count = reflection_count + 1 WHERE user_id = ?";

pub const DELETE_USER: &str = "DELETE FROM users WHERE user_id = ?";

pub const COUNT_ALL_MEMORIES: &str = "SELECT COUNT(*) FROM memories";

pub const COUNT_ALL_USERS: &str = "SELECT COUNT(*) FROM users";

pub const COUNT_ALL_FACTS: &str = "SELECT COUNT(*) FROM temporal_facts";

pub const COUNT_ALL_WAYPOINTS: &str = "SELECT COUNT(*) FROM waypoints";

pub const SECTOR_HISTOGRAM: &str =
    "SELECT primary_sector, COUNT(*) FROM memories GROUP BY primary_sector";

pub const AVG_SALIENCE: &str = "SELECT AVG(salience) FROM memories";

pub const RECORD_MIGRATION: &str =
    "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)";

pub const APPLIED_MIGRATIONS: &str =
    "SELECT version FROM schema_migrations ORDER BY version";

pub const INSERT_KEY_VERSION: &str =
    "INSERT INTO encryption_keys (version, created_at, retired) VALUES (?, ?, ?) \
     ON CONFLICT (version) DO NOTHING";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::count_placeholders;

    #[test]
    fn placeholder_counts_match_bindings() {
        assert_eq!(count_placeholders(INSERT_MEMORY), 15);
        assert_eq!(count_placeholders(GET_MEMORY), 1);
        assert_eq!(count_placeholders(UPDATE_MEMORY), 13);
        assert_eq!(count_placeholders(INSERT_VECTOR), 5);
        assert_eq!(count_placeholders(UPSERT_WAYPOINT), 6);
        assert_eq!(count_placeholders(INSERT_FACT), 10);
        assert_eq!(count_placeholders(INSERT_AUDIT), 9);
        assert_eq!(count_placeholders(RATE_LIMIT_BUMP), 2);
    }

    #[test]
    fn every_statement_rewrites_cleanly_for_remote() {
        for sql in [
            INSERT_MEMORY,
            GET_MEMORY,
            LIST_MEMORIES_BY_USER,
            UPDATE_MEMORY,
            DELETE_MEMORY,
            INSERT_VECTOR,
            SCAN_VECTORS_BY_SECTOR,
            UPSERT_WAYPOINT,
            NEIGHBORS_OF,
            INSERT_FACT,
            FIND_OPEN_FACT,
            CLOSE_FACT_INTERVAL,
            INSERT_EDGE,
            INSERT_AUDIT,
            RATE_LIMIT_BUMP,
            INSERT_API_KEY,
            UPSERT_USER,
        ] {
            let remote = crate::sql::for_remote(sql, "om_", TABLES);
            assert_eq!(
                count_placeholders(sql),
                count_placeholders(&remote),
                "placeholder count changed in: {sql}"
            );
            assert!(!remote.contains('?'), "unrewritten placeholder in: {remote}");
        }
    }
}
