//! The device-local persisted seen-set.
//!
//! One small SQLite database per device holding the photo IDs already shown
//! (or blacklisted after a broken reference) plus a handful of flags the
//! orchestrator needs across launches: the last history-reset timestamp,
//! the one-time tutorial flag, the spin counter, and whether the previous
//! spin showed an ad.
//!
//! The set grows monotonically until an explicit user reset. Only the
//! orchestrator writes here, so there are no concurrent-writer concerns.

use std::path::Path;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use spindrop_shared::types::PhotoId;
use uuid::Uuid;

use crate::error::{ClientError, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS seen_photos (
    id       TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    added_at TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

const META_LAST_RESET_AT: &str = "last_reset_at";
const META_TUTORIAL_DONE: &str = "tutorial_done";
const META_SPIN_COUNT: &str = "spin_count";
const META_LAST_SPIN_WAS_AD: &str = "last_spin_was_ad";

/// Persisted per-device seen-set and orchestrator flags.
pub struct SeenStore {
    conn: Connection,
}

impl SeenStore {
    /// Open (or create) the seen-set database in the platform data
    /// directory.
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "spindrop", "spindrop").ok_or(ClientError::NoDataDir)?;
        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let path = data_dir.join("seen.db");
        tracing::info!(path = %path.display(), "opening seen-set store");
        Self::open_at(&path)
    }

    /// Open (or create) a seen-set database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Transient in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Record a photo as seen (or blacklisted). Idempotent.
    pub fn insert(&self, id: PhotoId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO seen_photos (id, added_at) VALUES (?1, ?2)",
            params![id.0.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn contains(&self, id: PhotoId) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM seen_photos WHERE id = ?1",
                params![id.0.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_photos", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Full snapshot for a selection request's exclusion list.
    pub fn snapshot(&self) -> Result<Vec<PhotoId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM seen_photos")?;
        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            Uuid::parse_str(&id_str).map(PhotoId).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// User-initiated history reset: empty the set and stamp the reset
    /// time, which turns on freshness priority for subsequent selections.
    pub fn clear_and_stamp_reset(&self, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute("DELETE FROM seen_photos", [])?;
        self.meta_set(META_LAST_RESET_AT, &at.to_rfc3339())?;
        tracing::info!(reset_at = %at, "seen-set cleared");
        Ok(())
    }

    pub fn last_reset_at(&self) -> Result<Option<DateTime<Utc>>> {
        match self.meta_get(META_LAST_RESET_AT)? {
            Some(raw) => {
                let ts = DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc);
                Ok(Some(ts))
            }
            None => Ok(None),
        }
    }

    pub fn tutorial_done(&self) -> Result<bool> {
        Ok(self.meta_get(META_TUTORIAL_DONE)?.as_deref() == Some("1"))
    }

    pub fn set_tutorial_done(&self) -> Result<()> {
        self.meta_set(META_TUTORIAL_DONE, "1")
    }

    pub fn spin_count(&self) -> Result<u64> {
        Ok(self
            .meta_get(META_SPIN_COUNT)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub fn set_spin_count(&self, count: u64) -> Result<()> {
        self.meta_set(META_SPIN_COUNT, &count.to_string())
    }

    pub fn last_spin_was_ad(&self) -> Result<bool> {
        Ok(self.meta_get(META_LAST_SPIN_WAS_AD)?.as_deref() == Some("1"))
    }

    pub fn set_last_spin_was_ad(&self, was_ad: bool) -> Result<()> {
        self.meta_set(META_LAST_SPIN_WAS_AD, if was_ad { "1" } else { "0" })
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
