use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a shared photo record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhotoId(pub Uuid);

impl PhotoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an uploading account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Place filter narrowing the selection pool.
///
/// Each variant refines the previous one; `Global` matches every photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Country {
        country: String,
    },
    Region {
        country: String,
        region: String,
    },
    City {
        country: String,
        region: String,
        city: String,
    },
}

impl Scope {
    pub fn country(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Country { country }
            | Scope::Region { country, .. }
            | Scope::City { country, .. } => Some(country),
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Scope::Region { region, .. } | Scope::City { region, .. } => Some(region),
            _ => None,
        }
    }

    pub fn city(&self) -> Option<&str> {
        match self {
            Scope::City { city, .. } => Some(city),
            _ => None,
        }
    }
}

/// Direction of a seeded range scan over the `random_seed` axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    Ascending,
    Descending,
}

/// One selection request as sent by a device.
///
/// Ephemeral: never persisted server-side. `excluded_ids` is the device's
/// seen-set snapshot; `excluded_owner` keeps a user from being served their
/// own uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionRequest {
    pub scope: Scope,
    pub excluded_owner: Option<AccountId>,
    pub excluded_ids: Vec<PhotoId>,
    /// When present, recently-uploaded photos are preferred (freshness
    /// priority after a seen-set reset).
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl SelectionRequest {
    pub fn global() -> Self {
        Self {
            scope: Scope::Global,
            excluded_owner: None,
            excluded_ids: Vec::new(),
            last_reset_at: None,
        }
    }
}

/// Server reply to a selection request. `photo: None` means no candidate;
/// the device decides whether that is exhaustion or an empty pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    pub photo: Option<crate::photo::PhotoRecord>,
}

/// Upload request body. The server assigns the ID, timestamps, and the
/// sampling seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhotoRequest {
    pub owner: AccountId,
    pub image_ref: String,
    pub location: Option<crate::photo::GeoLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_accessors() {
        let city = Scope::City {
            country: "JP".into(),
            region: "Tokyo".into(),
            city: "Shibuya".into(),
        };
        assert_eq!(city.country(), Some("JP"));
        assert_eq!(city.region(), Some("Tokyo"));
        assert_eq!(city.city(), Some("Shibuya"));

        assert_eq!(Scope::Global.country(), None);
        assert_eq!(
            Scope::Country {
                country: "FR".into()
            }
            .city(),
            None
        );
    }

    #[test]
    fn selection_request_round_trip() {
        let req = SelectionRequest {
            scope: Scope::Country {
                country: "DE".into(),
            },
            excluded_owner: Some(AccountId::new()),
            excluded_ids: vec![PhotoId::new(), PhotoId::new()],
            last_reset_at: Some(Utc::now()),
        };

        let json = serde_json::to_string(&req).unwrap();
        let back: SelectionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
