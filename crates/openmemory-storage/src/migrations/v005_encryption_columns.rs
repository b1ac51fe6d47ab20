//! v005: key_version and archived columns on memories, with defaults so
//! existing rows stay readable.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 5,
    name: "encryption_columns",
    embedded: &[
        "ALTER TABLE memories ADD COLUMN key_version INTEGER NOT NULL DEFAULT 0;",
        "ALTER TABLE memories ADD COLUMN archived INTEGER NOT NULL DEFAULT 0;",
    ],
    remote: &[
        "ALTER TABLE om_memories ADD COLUMN IF NOT EXISTS key_version INTEGER NOT NULL DEFAULT 0;",
        "ALTER TABLE om_memories ADD COLUMN IF NOT EXISTS archived BOOLEAN NOT NULL DEFAULT FALSE;",
    ],
    remote_optional: &[],
};
