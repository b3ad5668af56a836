use thiserror::Error;

/// Infrastructure failures during selection. "No candidate" is not among
/// them; it is an `Ok(None)` outcome.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] spindrop_store::StoreError),

    #[error("Store handle poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
