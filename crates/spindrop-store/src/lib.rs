//! # spindrop-store
//!
//! Durable photo collection backing the gacha selection engine, stored in
//! SQLite. The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides the query contract the selection core
//! needs: seeded range scans over the `random_seed` axis, recency-ordered
//! scans, existence checks, point lookups, and atomic counter updates.
//!
//! Concurrent readers are SQLite's concern (WAL mode); callers that share a
//! handle across async tasks wrap it in a mutex.

pub mod database;
pub mod migrations;
pub mod photos;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
