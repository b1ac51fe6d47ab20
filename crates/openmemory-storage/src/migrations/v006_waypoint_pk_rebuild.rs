//! v006: rebuild the waypoint primary key to (src_id, dst_id, user_id).
//!
//! Embedded: copy-new/swap, since the table cannot alter its key in place.
//! Remote: drop the constraint, deduplicate, add the new key.

use super::Migration;

pub const MIGRATION: Migration = Migration {
    version: 6,
    name: "waypoint_pk_rebuild",
    embedded: &[
        "
        CREATE TABLE waypoints_new (
            src_id     TEXT NOT NULL,
            dst_id     TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            weight     REAL NOT NULL DEFAULT 0.1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (src_id, dst_id, user_id)
        );

        INSERT INTO waypoints_new (src_id, dst_id, user_id, weight, created_at, updated_at)
        SELECT src_id, dst_id, user_id, weight, created_at, updated_at FROM waypoints;

        DROP TABLE waypoints;

        ALTER TABLE waypoints_new RENAME TO waypoints;
        ",
    ],
    remote: &[
        "
        ALTER TABLE om_waypoints DROP CONSTRAINT IF EXISTS om_waypoints_pkey;

        DELETE FROM om_waypoints a USING om_waypoints b
         WHERE a.ctid < b.ctid
           AND a.src_id = b.src_id
           AND a.dst_id = b.dst_id
           AND a.user_id = b.user_id;

        ALTER TABLE om_waypoints ADD PRIMARY KEY (src_id, dst_id, user_id);
        ",
    ],
    remote_optional: &[],
};
