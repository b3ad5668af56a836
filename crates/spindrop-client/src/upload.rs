//! Cancellable photo upload.
//!
//! The upload itself is one backend call; the interesting contract is
//! cancellation: once [`UploadHandle::cancel`] has been called, the upload
//! must never surface as a success, even when the server-side write lands
//! after the fact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spindrop_shared::photo::PhotoRecord;
use spindrop_shared::types::CreatePhotoRequest;

use crate::backend::GachaBackend;
use crate::error::Result;

/// Cancellation flag shared between the UI and a running upload.
#[derive(Clone, Default)]
pub struct UploadHandle {
    cancelled: Arc<AtomicBool>,
}

impl UploadHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Terminal state of an upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(PhotoRecord),
    Cancelled,
}

/// Run one upload against the backend, honouring the cancellation flag on
/// both sides of the network call.
pub async fn upload_photo<B: GachaBackend>(
    backend: &B,
    request: CreatePhotoRequest,
    handle: &UploadHandle,
) -> Result<UploadOutcome> {
    if handle.is_cancelled() {
        return Ok(UploadOutcome::Cancelled);
    }

    let record = backend.create_photo(request).await?;

    if handle.is_cancelled() {
        // The write may have landed server-side; a cancelled upload still
        // must not transition to success.
        tracing::info!(id = %record.id, "upload finished after cancellation, ignoring");
        return Ok(UploadOutcome::Cancelled);
    }

    tracing::info!(id = %record.id, "upload complete");
    Ok(UploadOutcome::Completed(record))
}
