//! The photo record model and its construction rules.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::PHOTO_TTL_DAYS;
use crate::types::{AccountId, PhotoId};

/// Structured place data attached to a photo. Mutable by the owner after
/// creation (edit or redact).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub sub_locality: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// Human-readable label, most specific part first ("Shibuya, Tokyo, JP").
    pub fn label(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(city) = &self.city {
            parts.push(city);
        }
        if let Some(region) = &self.region {
            parts.push(region);
        }
        parts.push(&self.country);
        parts.join(", ")
    }
}

/// Lifecycle state of a photo record. Only `Active` records are eligible
/// for selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Active,
    Removed,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Active => "active",
            PhotoStatus::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PhotoStatus::Active),
            "removed" => Some(PhotoStatus::Removed),
            _ => None,
        }
    }
}

/// One shared photo.
///
/// `random_seed` is drawn uniformly from `[0, 1)` at creation and never
/// changes; it is the sampling key for seeded range scans. Seed collisions
/// are astronomically unlikely and only dent sampling uniformity, never
/// correctness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub owner: AccountId,
    /// Opaque blob-store locator (path or URL).
    pub image_ref: String,
    pub location: Option<GeoLocation>,
    pub created_at: DateTime<Utc>,
    /// `created_at` + 7 days. Removal is the server sweep's concern.
    pub expire_at: DateTime<Utc>,
    pub random_seed: f64,
    pub status: PhotoStatus,
    pub like_count: i64,
    pub impression_count: i64,
}

impl PhotoRecord {
    /// Build a fresh record for an upload, stamping timestamps and drawing
    /// the sampling seed.
    pub fn new(owner: AccountId, image_ref: String, location: Option<GeoLocation>) -> Self {
        let now = Utc::now();
        Self {
            id: PhotoId::new(),
            owner,
            image_ref,
            location,
            created_at: now,
            expire_at: now + Duration::days(PHOTO_TTL_DAYS),
            random_seed: rand::thread_rng().gen::<f64>(),
            status: PhotoStatus::Active,
            like_count: 0,
            impression_count: 0,
        }
    }
}
