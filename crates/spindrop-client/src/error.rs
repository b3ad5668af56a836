use thiserror::Error;

use crate::backend::{AdError, BackendError};

/// Errors produced by the client layer.
///
/// Within the gacha flow these are internal: the orchestrator maps every
/// selection-path failure to the ad fallback and the presentation layer
/// never renders them as dialogs. Administrative flows (upload, delete)
/// surface them as dismissible messages.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Seen-set storage error.
    #[error("Seen-set storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the data directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timestamp stored in the seen-set failed to parse.
    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Selection backend failure (network or server side).
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The ad collaborator had nothing to show.
    #[error("Ad error: {0}")]
    Ad(#[from] AdError),

    /// A shared handle was poisoned by a panicking task.
    #[error("Client state poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
