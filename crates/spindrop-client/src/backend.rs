//! Collaborator contracts the orchestrator drives.
//!
//! Each trait returns `impl Future + Send` so orchestrator futures stay
//! spawnable; implementations live in [`crate::remote`] for production and
//! in test modules as mocks.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spindrop_shared::error::FetchError;
use spindrop_shared::photo::PhotoRecord;
use spindrop_shared::types::{CreatePhotoRequest, PhotoId, SelectionRequest};

/// Selection backend failure classes as seen from the device.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Could not reach the server at all.
    #[error("Network unavailable: {0}")]
    Offline(String),

    /// The server answered with an error.
    #[error("Backend error: {0}")]
    Remote(String),
}

/// The server-side gacha API as the device sees it.
pub trait GachaBackend: Send + Sync {
    /// Ask for one eligible photo. `Ok(None)` means no candidate.
    fn select(
        &self,
        request: SelectionRequest,
    ) -> impl Future<Output = Result<Option<PhotoRecord>, BackendError>> + Send;

    /// Bump the impression counter for a presented photo. Best-effort.
    fn record_impression(
        &self,
        id: PhotoId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Upload a new photo record.
    fn create_photo(
        &self,
        request: CreatePhotoRequest,
    ) -> impl Future<Output = Result<PhotoRecord, BackendError>> + Send;
}

/// Image blob collaborator: bytes or a structured miss.
pub trait ImageFetcher: Send + Sync {
    fn fetch(
        &self,
        image_ref: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// One advertisement creative, externally sourced. The gacha pool is never
/// touched on an ad spin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdCreative {
    pub id: String,
    pub asset_ref: String,
}

#[derive(Error, Debug)]
pub enum AdError {
    #[error("Ad unavailable: {0}")]
    Unavailable(String),
}

/// Ad SDK contract: request a creative, asynchronously; may fail or time
/// out. The orchestrator keeps one creative prefetched.
pub trait AdProvider: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<AdCreative, AdError>> + Send;
}
