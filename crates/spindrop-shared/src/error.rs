use thiserror::Error;

/// Outcome classes for the image blob collaborator.
///
/// `NotFound` marks an orphaned reference: the record exists but its bytes
/// are gone. The orchestrator blacklists the ID client-side and retries;
/// the record itself stays `active` (deletion is an administrative action).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Referenced image not found")]
    NotFound,

    #[error("Network unavailable: {0}")]
    Offline(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}
