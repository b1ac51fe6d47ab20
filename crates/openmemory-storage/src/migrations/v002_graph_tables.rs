//! v002: waypoints, temporal facts, temporal edges.
//!
//! The original waypoint primary key was (src_id, dst_id); v006 rebuilds it
//! to include user_id.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 2,
    name: "graph_tables",
    embedded: &[
        "
        CREATE TABLE IF NOT EXISTS waypoints (
            src_id     TEXT NOT NULL,
            dst_id     TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            weight     REAL NOT NULL DEFAULT 0.1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (src_id, dst_id)
        );

        CREATE TABLE IF NOT EXISTS temporal_facts (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            subject      TEXT NOT NULL,
            predicate    TEXT NOT NULL,
            object       TEXT NOT NULL,
            valid_from   TEXT NOT NULL,
            valid_to     TEXT,
            confidence   REAL NOT NULL DEFAULT 1.0,
            last_updated TEXT NOT NULL,
            metadata     TEXT NOT NULL DEFAULT '{}',
            UNIQUE (user_id, subject, predicate, object, valid_from)
        );

        CREATE TABLE IF NOT EXISTS temporal_edges (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            source_fact   TEXT NOT NULL,
            target_fact   TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            valid_from    TEXT NOT NULL,
            valid_to      TEXT,
            weight        REAL NOT NULL,
            metadata      TEXT NOT NULL DEFAULT '{}'
        );
        ",
    ],
    remote: &[
        "
        CREATE TABLE IF NOT EXISTS om_waypoints (
            src_id     TEXT NOT NULL,
            dst_id     TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            weight     DOUBLE PRECISION NOT NULL DEFAULT 0.1,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            CONSTRAINT om_waypoints_pkey PRIMARY KEY (src_id, dst_id)
        );

        CREATE TABLE IF NOT EXISTS om_temporal_facts (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            subject      TEXT NOT NULL,
            predicate    TEXT NOT NULL,
            object       TEXT NOT NULL,
            valid_from   TIMESTAMPTZ NOT NULL,
            valid_to     TIMESTAMPTZ,
            confidence   DOUBLE PRECISION NOT NULL DEFAULT 1.0,
            last_updated TIMESTAMPTZ NOT NULL,
            metadata     JSONB NOT NULL DEFAULT '{}',
            UNIQUE (user_id, subject, predicate, object, valid_from)
        );

        CREATE TABLE IF NOT EXISTS om_temporal_edges (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            source_fact   TEXT NOT NULL,
            target_fact   TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            valid_from    TIMESTAMPTZ NOT NULL,
            valid_to      TIMESTAMPTZ,
            weight        DOUBLE PRECISION NOT NULL,
            metadata      JSONB NOT NULL DEFAULT '{}'
        );
        ",
    ],
    remote_optional: &[],
};
