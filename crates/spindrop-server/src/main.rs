//! # spindrop-server
//!
//! Backend for the Spindrop photo gacha.
//!
//! This binary provides:
//! - **Photo store** (SQLite) holding shared photo records and their
//!   sampling seeds
//! - **Selection endpoint** serving one random unseen photo per spin
//! - **REST API** (axum) for uploads, likes, impressions, location edits,
//!   and liveness checks on photo references
//! - **TTL sweep** retiring photos past their lifetime

mod api;
mod config;
mod error;
mod push;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use spindrop_engine::SelectionEngine;
use spindrop_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::push::LogPushSender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,spindrop_server=debug")),
        )
        .init();

    info!("Starting Spindrop server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Arc::new(Mutex::new(Database::open_at(&config.db_path)?));
    let engine = SelectionEngine::new(db.clone());

    let app_state = AppState {
        db: db.clone(),
        engine,
        push: Arc::new(LogPushSender),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Hourly TTL sweep retiring photos past their lifetime.
    let sweep_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match sweep_db.lock() {
                Ok(db) => {
                    if let Err(e) = db.purge_expired(chrono::Utc::now()) {
                        tracing::warn!(error = %e, "TTL sweep failed");
                    }
                }
                Err(_) => tracing::warn!("TTL sweep skipped: store lock poisoned"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
