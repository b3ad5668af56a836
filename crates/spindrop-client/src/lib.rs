//! # spindrop-client
//!
//! The per-device gacha orchestrator: a single-flight async state machine
//! that drives the selection backend, maintains the device's persisted
//! seen-set, interleaves ads, retries past broken image references, and
//! synchronizes the reveal with the presentation layer's card animation.
//!
//! The presentation layer itself (views, animations) is not here; it talks
//! to the [`Orchestrator`] through `request_gacha` / `card_timing_ready` /
//! `reset_history` and renders whatever [`SpinOutcome`] comes back.

pub mod ads;
pub mod backend;
pub mod orchestrator;
pub mod remote;
pub mod seen;
pub mod upload;

mod error;

pub use error::{ClientError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SpinOutcome};
pub use seen::SeenStore;
