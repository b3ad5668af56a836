//! HTTP implementations of the collaborator contracts, speaking to a
//! spindrop-server instance.

use std::future::Future;

use spindrop_shared::error::FetchError;
use spindrop_shared::photo::PhotoRecord;
use spindrop_shared::types::{CreatePhotoRequest, PhotoId, SelectResponse, SelectionRequest};

use crate::backend::{BackendError, GachaBackend, ImageFetcher};

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_connect() || e.is_timeout() {
        BackendError::Offline(e.to_string())
    } else {
        BackendError::Remote(e.to_string())
    }
}

/// Gacha API client. Self-hosted users point `base_url` at their own
/// instance.
#[derive(Clone)]
pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl GachaBackend for RemoteBackend {
    fn select(
        &self,
        request: SelectionRequest,
    ) -> impl Future<Output = Result<Option<PhotoRecord>, BackendError>> + Send {
        async move {
            let response = self
                .http
                .post(format!("{}/gacha/select", self.base_url))
                .json(&request)
                .send()
                .await
                .map_err(classify)?
                .error_for_status()
                .map_err(classify)?;

            let body: SelectResponse = response.json().await.map_err(classify)?;
            Ok(body.photo)
        }
    }

    fn record_impression(
        &self,
        id: PhotoId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        async move {
            self.http
                .post(format!("{}/photos/{}/impression", self.base_url, id))
                .send()
                .await
                .map_err(classify)?
                .error_for_status()
                .map_err(classify)?;
            Ok(())
        }
    }

    fn create_photo(
        &self,
        request: CreatePhotoRequest,
    ) -> impl Future<Output = Result<PhotoRecord, BackendError>> + Send {
        async move {
            let response = self
                .http
                .post(format!("{}/photos", self.base_url))
                .json(&request)
                .send()
                .await
                .map_err(classify)?
                .error_for_status()
                .map_err(classify)?;

            response.json().await.map_err(classify)
        }
    }
}

/// Blob fetcher over HTTP. A 404 from the blob store is the structured
/// `NotFound` the orchestrator's blacklist logic keys on; everything else
/// is `Offline`.
#[derive(Clone, Default)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(
        &self,
        image_ref: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let url = image_ref.to_string();
        async move {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Offline(e.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound);
            }

            let response = response
                .error_for_status()
                .map_err(|e| FetchError::Offline(e.to_string()))?;

            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Offline(e.to_string()))?;
            Ok(bytes.to_vec())
        }
    }
}
