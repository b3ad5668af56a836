//! # spindrop-shared
//!
//! Domain types shared across the Spindrop photo-gacha core: identifiers,
//! the photo record model, selection scopes, the wire request/response
//! shapes, and the product tuning constants.
//!
//! Everything here derives `Serialize`/`Deserialize` so the same structs can
//! travel over the REST API and be handed to storage unchanged.

pub mod constants;
pub mod error;
pub mod photo;
pub mod types;
