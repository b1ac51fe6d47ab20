//! v001: memories and vectors.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 1,
    name: "core_tables",
    embedded: &[
        "
        CREATE TABLE IF NOT EXISTS memories (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            content          TEXT NOT NULL,
            content_hash     TEXT NOT NULL,
            primary_sector   TEXT NOT NULL,
            tags             TEXT NOT NULL DEFAULT '[]',
            metadata         TEXT NOT NULL DEFAULT '{}',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            last_accessed_at TEXT NOT NULL,
            salience         REAL NOT NULL DEFAULT 0.5,
            decay_rate       REAL NOT NULL DEFAULT 0.02,
            version          INTEGER NOT NULL DEFAULT 1,
            UNIQUE (user_id, content_hash)
        );

        CREATE TABLE IF NOT EXISTS vectors (
            memory_id  TEXT NOT NULL,
            sector     TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            payload    BLOB NOT NULL,
            dim        INTEGER NOT NULL,
            PRIMARY KEY (memory_id, sector, user_id)
        );
        ",
    ],
    remote: &[
        "
        CREATE TABLE IF NOT EXISTS om_memories (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            content          TEXT NOT NULL,
            content_hash     TEXT NOT NULL,
            primary_sector   TEXT NOT NULL,
            tags             JSONB NOT NULL DEFAULT '[]',
            metadata         JSONB NOT NULL DEFAULT '{}',
            created_at       TIMESTAMPTZ NOT NULL,
            updated_at       TIMESTAMPTZ NOT NULL,
            last_accessed_at TIMESTAMPTZ NOT NULL,
            salience         DOUBLE PRECISION NOT NULL DEFAULT 0.5,
            decay_rate       DOUBLE PRECISION NOT NULL DEFAULT 0.02,
            version          BIGINT NOT NULL DEFAULT 1,
            UNIQUE (user_id, content_hash)
        );

        CREATE TABLE IF NOT EXISTS om_vectors (
            memory_id  TEXT NOT NULL,
            sector     TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            payload    BYTEA NOT NULL,
            dim        INTEGER NOT NULL,
            PRIMARY KEY (memory_id, sector, user_id)
        );
        ",
    ],
    remote_optional: &[],
};
