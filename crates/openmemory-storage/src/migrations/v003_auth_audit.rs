//! v003: api_keys, audit_log, rate_limits.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 3,
    name: "auth_audit",
    embedded: &[
        "
        CREATE TABLE IF NOT EXISTS api_keys (
            hash         TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            scopes       TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL,
            last_used_at TEXT,
            disabled     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id            TEXT PRIMARY KEY,
            user_id       TEXT,
            action        TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id   TEXT,
            ip            TEXT,
            ua            TEXT,
            metadata      TEXT NOT NULL DEFAULT '{}',
            timestamp     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rate_limits (
            rl_key       TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            hits         INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (rl_key, window_start)
        );
        ",
    ],
    remote: &[
        "
        CREATE TABLE IF NOT EXISTS om_api_keys (
            hash         TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            scopes       JSONB NOT NULL DEFAULT '[]',
            created_at   TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ,
            disabled     BOOLEAN NOT NULL DEFAULT FALSE
        );

        CREATE TABLE IF NOT EXISTS om_audit_log (
            id            TEXT PRIMARY KEY,
            user_id       TEXT,
            action        TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id   TEXT,
            ip            TEXT,
            ua            TEXT,
            metadata      JSONB NOT NULL DEFAULT '{}',
            timestamp     TIMESTAMPTZ NOT NULL
        );

        CREATE TABLE IF NOT EXISTS om_rate_limits (
            rl_key       TEXT NOT NULL,
            window_start BIGINT NOT NULL,
            hits         BIGINT NOT NULL DEFAULT 0,
            PRIMARY KEY (rl_key, window_start)
        );
        ",
    ],
    remote_optional: &[],
};
