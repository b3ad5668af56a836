//! Photo queries: the store-side contract of the selection core.
//!
//! The interesting operations are [`Database::sample_near`] (seeded range
//! scan over the `random_seed` axis, one direction per call; the engine
//! issues the descending call itself when the ascending side comes up
//! short) and [`Database::recent_since`] (freshness-priority window).
//! Everything else is ordinary CRUD, with the one constraint that counter
//! updates are single-statement atomic adds.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use uuid::Uuid;

use spindrop_shared::photo::{GeoLocation, PhotoRecord, PhotoStatus};
use spindrop_shared::types::{AccountId, PhotoId, ScanDirection, Scope};

use crate::database::Database;
use crate::error::{Result, StoreError};

const PHOTO_COLUMNS: &str = "id, owner_id, image_ref, country, region, city, sub_locality, \
     latitude, longitude, created_at, expire_at, random_seed, status, like_count, impression_count";

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let image_ref: String = row.get(2)?;
    let country: Option<String> = row.get(3)?;
    let region: Option<String> = row.get(4)?;
    let city: Option<String> = row.get(5)?;
    let sub_locality: Option<String> = row.get(6)?;
    let latitude: Option<f64> = row.get(7)?;
    let longitude: Option<f64> = row.get(8)?;
    let created_str: String = row.get(9)?;
    let expire_str: String = row.get(10)?;
    let random_seed: f64 = row.get(11)?;
    let status_str: String = row.get(12)?;
    let like_count: i64 = row.get(13)?;
    let impression_count: i64 = row.get(14)?;

    let status = PhotoStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("unknown photo status '{status_str}'").into(),
        )
    })?;

    // A record has location data iff country is set; the other fields are
    // refinements.
    let location = country.map(|country| GeoLocation {
        country,
        region,
        city,
        sub_locality,
        latitude,
        longitude,
    });

    Ok(PhotoRecord {
        id: PhotoId(parse_uuid(0, &id_str)?),
        owner: AccountId(parse_uuid(1, &owner_str)?),
        image_ref,
        location,
        created_at: parse_ts(9, &created_str)?,
        expire_at: parse_ts(10, &expire_str)?,
        random_seed,
        status,
        like_count,
        impression_count,
    })
}

/// Append scope filter clauses (`?` placeholders) to a query under
/// construction.
fn push_scope(scope: &Scope, sql: &mut String, values: &mut Vec<Value>) {
    if let Some(country) = scope.country() {
        sql.push_str(" AND country = ?");
        values.push(Value::Text(country.to_string()));
    }
    if let Some(region) = scope.region() {
        sql.push_str(" AND region = ?");
        values.push(Value::Text(region.to_string()));
    }
    if let Some(city) = scope.city() {
        sql.push_str(" AND city = ?");
        values.push(Value::Text(city.to_string()));
    }
}

impl Database {
    /// Insert a new photo record.
    pub fn create_photo(&self, photo: &PhotoRecord) -> Result<()> {
        let loc = photo.location.as_ref();
        self.conn().execute(
            "INSERT INTO photos (id, owner_id, image_ref, country, region, city, sub_locality, \
             latitude, longitude, created_at, expire_at, random_seed, status, like_count, impression_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                photo.id.0.to_string(),
                photo.owner.0.to_string(),
                photo.image_ref,
                loc.map(|l| l.country.clone()),
                loc.and_then(|l| l.region.clone()),
                loc.and_then(|l| l.city.clone()),
                loc.and_then(|l| l.sub_locality.clone()),
                loc.and_then(|l| l.latitude),
                loc.and_then(|l| l.longitude),
                photo.created_at.to_rfc3339(),
                photo.expire_at.to_rfc3339(),
                photo.random_seed,
                photo.status.as_str(),
                photo.like_count,
                photo.impression_count,
            ],
        )?;

        tracing::debug!(id = %photo.id, seed = photo.random_seed, "created photo record");
        Ok(())
    }

    /// Point lookup. Returns [`StoreError::NotFound`] for unknown IDs
    /// (removed records are still returned; callers check `status`).
    pub fn get_photo(&self, id: PhotoId) -> Result<PhotoRecord> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1");
        self.conn()
            .query_row(&sql, params![id.0.to_string()], row_to_photo)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Seeded range scan: up to `limit` active records ordered by
    /// `random_seed`, starting at `seed` (inclusive) when ascending or
    /// strictly below it when descending, filtered by `scope`.
    ///
    /// Wraparound is the caller's job: when the ascending side yields no
    /// usable candidate, issue a second call for the descending side.
    pub fn sample_near(
        &self,
        seed: f64,
        scope: &Scope,
        limit: usize,
        direction: ScanDirection,
    ) -> Result<Vec<PhotoRecord>> {
        let mut sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE status = 'active'");
        let mut values: Vec<Value> = Vec::new();

        match direction {
            ScanDirection::Ascending => sql.push_str(" AND random_seed >= ?"),
            ScanDirection::Descending => sql.push_str(" AND random_seed < ?"),
        }
        values.push(Value::Real(seed));

        push_scope(scope, &mut sql, &mut values);

        match direction {
            ScanDirection::Ascending => sql.push_str(" ORDER BY random_seed ASC LIMIT ?"),
            ScanDirection::Descending => sql.push_str(" ORDER BY random_seed DESC LIMIT ?"),
        }
        values.push(Value::Integer(limit as i64));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_photo)?;

        let mut photos = Vec::new();
        for row in rows {
            photos.push(row?);
        }
        Ok(photos)
    }

    /// Up to `limit` active records created strictly after `since`, newest
    /// first, filtered by `scope`.
    pub fn recent_since(
        &self,
        since: DateTime<Utc>,
        scope: &Scope,
        limit: usize,
    ) -> Result<Vec<PhotoRecord>> {
        let mut sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE status = 'active' AND created_at > ?"
        );
        let mut values: Vec<Value> = vec![Value::Text(since.to_rfc3339())];

        push_scope(scope, &mut sql, &mut values);

        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_photo)?;

        let mut photos = Vec::new();
        for row in rows {
            photos.push(row?);
        }
        Ok(photos)
    }

    /// Return the subset of `ids` that still reference active records.
    pub fn exists(&self, ids: &[PhotoId]) -> Result<Vec<PhotoId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT 1 FROM photos WHERE id = ?1 AND status = 'active'")?;

        let mut alive = Vec::new();
        for id in ids {
            let found = stmt
                .query_row(params![id.0.to_string()], |_| Ok(()))
                .map(|_| true)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(false),
                    other => Err(other),
                })?;
            if found {
                alive.push(*id);
            }
        }
        Ok(alive)
    }

    /// Flip a record's lifecycle status (logical delete / restore).
    pub fn set_status(&self, id: PhotoId, status: PhotoStatus) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE photos SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.0.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tracing::debug!(id = %id, status = status.as_str(), "updated photo status");
        Ok(())
    }

    /// Edit or redact a photo's place data. Owner-gated: a mismatched
    /// `owner` behaves like an unknown ID.
    pub fn update_location(
        &self,
        id: PhotoId,
        owner: AccountId,
        location: Option<&GeoLocation>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE photos SET country = ?1, region = ?2, city = ?3, sub_locality = ?4, \
             latitude = ?5, longitude = ?6 WHERE id = ?7 AND owner_id = ?8",
            params![
                location.map(|l| l.country.clone()),
                location.and_then(|l| l.region.clone()),
                location.and_then(|l| l.city.clone()),
                location.and_then(|l| l.sub_locality.clone()),
                location.and_then(|l| l.latitude),
                location.and_then(|l| l.longitude),
                id.0.to_string(),
                owner.0.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Adjust the like counter by `delta` (like: +1, unlike: -1) and return
    /// the new value. Single-statement add, so concurrent likes from many
    /// devices never lose updates; the counter never goes below zero.
    pub fn increment_like_count(&self, id: PhotoId, delta: i64) -> Result<i64> {
        let affected = self.conn().execute(
            "UPDATE photos SET like_count = MAX(0, like_count + ?1) WHERE id = ?2",
            params![delta, id.0.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        let count = self.conn().query_row(
            "SELECT like_count FROM photos WHERE id = ?1",
            params![id.0.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Bump the impression counter. Same atomicity story as likes.
    pub fn increment_impressions(&self, id: PhotoId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE photos SET impression_count = impression_count + 1 WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Retire records whose TTL elapsed. Returns how many were swept.
    /// Logical removal only, same as [`set_status`](Self::set_status).
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let swept = self.conn().execute(
            "UPDATE photos SET status = 'removed' WHERE status = 'active' AND expire_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        if swept > 0 {
            tracing::info!(swept, "purged expired photos");
        }
        Ok(swept)
    }
}
