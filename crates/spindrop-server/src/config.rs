//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use spindrop_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite photo database.
    /// Env: `DB_PATH`
    /// Default: `./spindrop.db`
    pub db_path: PathBuf,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Spindrop Node"`
    pub instance_name: String,

    /// Upper bound on the exclusion list a device may send per selection
    /// request. Oversized requests are rejected rather than truncated.
    /// Env: `MAX_EXCLUDED_IDS`
    /// Default: `10000`
    pub max_excluded_ids: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./spindrop.db"),
            instance_name: "Spindrop Node".to_string(),
            max_excluded_ids: 10_000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("MAX_EXCLUDED_IDS") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_excluded_ids = n;
            } else {
                tracing::warn!(value = %val, "Invalid MAX_EXCLUDED_IDS, using default");
            }
        }

        config
    }
}
