//! # spindrop-engine
//!
//! The gacha selection algorithm: given a requester's exclusions and scope,
//! return one eligible photo from the shared pool, or report that there is
//! no candidate.
//!
//! "No candidate" is a structured outcome (`Ok(None)`), never an error.
//! Whether that means "pool exhausted" (the device has seen everything) or
//! "pool empty" is the caller's distinction; this engine does not know about
//! per-device seen-set state beyond the exclusion list it is handed.

pub mod selection;

mod error;

pub use error::{EngineError, Result};
pub use selection::SelectionEngine;
