use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "Spindrop";

/// Batch size for one seeded range scan against the photo store.
///
/// Balances query cost against the chance of the whole batch being filtered
/// out by the caller's exclusions. Tuning value, not a correctness bound.
pub const SAMPLE_BATCH_SIZE: usize = 10;

/// Cap on the freshness-priority window consulted after a history reset.
pub const FRESH_WINDOW_LIMIT: usize = 50;

/// Total selection attempts per spin before falling back to an ad.
pub const MAX_SELECT_ATTEMPTS: u32 = 3;

/// Every Nth real spin forces an ad.
pub const AD_FORCE_INTERVAL: u64 = 5;

/// Probability of an ad on an ordinary spin.
pub const AD_CHANCE: f64 = 0.2;

/// Photos become eligible for removal this many days after creation.
/// Enforced by the server's periodic sweep, not at query time.
pub const PHOTO_TTL_DAYS: i64 = 7;

/// How long the orchestrator waits for the card reveal signal before
/// presenting anyway.
pub const CARD_TIMING_TIMEOUT: Duration = Duration::from_secs(5);

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
