//! v001 -- Initial schema creation.
//!
//! Creates the `photos` table and the two indexes the selection engine
//! leans on: the seeded-scan index over `random_seed` and the recency
//! index over `created_at`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Photos
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS photos (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id         TEXT NOT NULL,               -- UUID v4 of the uploading account
    image_ref        TEXT NOT NULL,               -- opaque blob locator
    country          TEXT,                        -- place data, all nullable (redactable)
    region           TEXT,
    city             TEXT,
    sub_locality     TEXT,
    latitude         REAL,
    longitude        REAL,
    created_at       TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    expire_at        TEXT NOT NULL,               -- created_at + TTL; swept periodically
    random_seed      REAL NOT NULL,               -- uniform in [0,1), sampling key
    status           TEXT NOT NULL DEFAULT 'active',
    like_count       INTEGER NOT NULL DEFAULT 0,
    impression_count INTEGER NOT NULL DEFAULT 0
);

-- Seeded range scans: WHERE status = 'active' AND random_seed >= ?
CREATE INDEX IF NOT EXISTS idx_photos_status_seed
    ON photos(status, random_seed);

-- Recency scans for the freshness-priority window
CREATE INDEX IF NOT EXISTS idx_photos_status_created
    ON photos(status, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_photos_owner ON photos(owner_id);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
