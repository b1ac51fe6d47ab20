//! v004: users, config, feature flags, webhooks, encryption key registry.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 4,
    name: "profile_tables",
    embedded: &[
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id          TEXT PRIMARY KEY,
            summary          TEXT,
            reflection_count INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            last_seen_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            cfg_key   TEXT PRIMARY KEY,
            cfg_value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS feature_flags (
            flag    TEXT PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS webhooks (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL,
            url        TEXT NOT NULL,
            events     TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            disabled   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS webhook_logs (
            id            TEXT PRIMARY KEY,
            webhook_id    TEXT NOT NULL,
            event         TEXT NOT NULL,
            status        TEXT NOT NULL,
            attempt       INTEGER NOT NULL DEFAULT 1,
            next_retry_at TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS encryption_keys (
            version    INTEGER PRIMARY KEY,
            created_at TEXT NOT NULL,
            retired    INTEGER NOT NULL DEFAULT 0
        );
        ",
    ],
    remote: &[
        "
        CREATE TABLE IF NOT EXISTS om_users (
            user_id          TEXT PRIMARY KEY,
            summary          TEXT,
            reflection_count BIGINT NOT NULL DEFAULT 0,
            created_at       TIMESTAMPTZ NOT NULL,
            last_seen_at     TIMESTAMPTZ NOT NULL
        );

        CREATE TABLE IF NOT EXISTS om_config_kv (
            cfg_key   TEXT PRIMARY KEY,
            cfg_value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS om_feature_flags (
            flag    TEXT PRIMARY KEY,
            enabled BOOLEAN NOT NULL DEFAULT FALSE
        );

        CREATE TABLE IF NOT EXISTS om_webhooks (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL,
            url        TEXT NOT NULL,
            events     JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ NOT NULL,
            disabled   BOOLEAN NOT NULL DEFAULT FALSE
        );

        CREATE TABLE IF NOT EXISTS om_webhook_logs (
            id            TEXT PRIMARY KEY,
            webhook_id    TEXT NOT NULL,
            event         TEXT NOT NULL,
            status        TEXT NOT NULL,
            attempt       INTEGER NOT NULL DEFAULT 1,
            next_retry_at TIMESTAMPTZ,
            created_at    TIMESTAMPTZ NOT NULL
        );

        CREATE TABLE IF NOT EXISTS om_encryption_keys (
            version    INTEGER PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL,
            retired    BOOLEAN NOT NULL DEFAULT FALSE
        );
        ",
    ],
    remote_optional: &[],
};
