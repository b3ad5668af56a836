use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::Method,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use spindrop_engine::SelectionEngine;
use spindrop_shared::photo::{GeoLocation, PhotoRecord, PhotoStatus};
use spindrop_shared::types::{CreatePhotoRequest, PhotoId, Scope, SelectResponse, SelectionRequest};
use spindrop_store::Database;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::push::PushSender;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub engine: SelectionEngine,
    pub push: Arc<dyn PushSender>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/gacha/select", post(gacha_select))
        .route("/photos", post(create_photo))
        .route("/photos/recent", get(recent_photos))
        .route("/photos/exists", post(photos_exist))
        .route("/photos/{id}", get(get_photo))
        .route("/photos/{id}", delete(delete_photo))
        .route("/photos/{id}/location", put(update_location))
        .route("/photos/{id}/like", post(like_photo))
        .route("/photos/{id}/impression", post(record_impression))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and run the HTTP API until the task is cancelled or the listener
/// fails.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    max_excluded_ids: usize,
}

#[derive(Deserialize)]
struct RecentQuery {
    since: DateTime<Utc>,
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct UpdateLocationRequest {
    owner: spindrop_shared::types::AccountId,
    location: Option<GeoLocation>,
}

#[derive(Deserialize)]
struct LikeRequest {
    /// +1 for like, -1 for unlike.
    delta: i64,
}

#[derive(Serialize)]
struct LikeResponse {
    like_count: i64,
}

#[derive(Deserialize)]
struct ExistsRequest {
    ids: Vec<PhotoId>,
}

#[derive(Serialize)]
struct ExistsResponse {
    ids: Vec<PhotoId>,
}

/// Assemble a [`Scope`] from optional query parts. Refinements require
/// their parents: a region needs a country, a city needs both.
fn scope_from_parts(
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
) -> Result<Scope, ServerError> {
    match (country, region, city) {
        (None, None, None) => Ok(Scope::Global),
        (Some(country), None, None) => Ok(Scope::Country { country }),
        (Some(country), Some(region), None) => Ok(Scope::Region { country, region }),
        (Some(country), Some(region), Some(city)) => Ok(Scope::City {
            country,
            region,
            city,
        }),
        _ => Err(ServerError::BadRequest(
            "scope parts must refine country > region > city".to_string(),
        )),
    }
}

fn lock_db(state: &AppState) -> Result<std::sync::MutexGuard<'_, Database>, ServerError> {
    state
        .db
        .lock()
        .map_err(|_| ServerError::Internal("store lock poisoned".to_string()))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        max_excluded_ids: state.config.max_excluded_ids,
    })
}

async fn gacha_select(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<SelectResponse>, ServerError> {
    if request.excluded_ids.len() > state.config.max_excluded_ids {
        return Err(ServerError::BadRequest(format!(
            "exclusion list too large ({} > {})",
            request.excluded_ids.len(),
            state.config.max_excluded_ids
        )));
    }

    let photo = state.engine.select(&request)?;
    Ok(Json(SelectResponse { photo }))
}

async fn create_photo(
    State(state): State<AppState>,
    Json(request): Json<CreatePhotoRequest>,
) -> Result<Json<PhotoRecord>, ServerError> {
    if request.image_ref.is_empty() {
        return Err(ServerError::BadRequest("empty image_ref".to_string()));
    }

    let record = PhotoRecord::new(request.owner, request.image_ref, request.location);
    lock_db(&state)?.create_photo(&record)?;

    info!(id = %record.id, owner = %record.owner, "photo uploaded");
    Ok(Json(record))
}

async fn recent_photos(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<PhotoRecord>>, ServerError> {
    let scope = scope_from_parts(query.country, query.region, query.city)?;
    let limit = query
        .limit
        .unwrap_or(spindrop_shared::constants::FRESH_WINDOW_LIMIT);

    let photos = lock_db(&state)?.recent_since(query.since, &scope, limit)?;
    Ok(Json(photos))
}

async fn photos_exist(
    State(state): State<AppState>,
    Json(request): Json<ExistsRequest>,
) -> Result<Json<ExistsResponse>, ServerError> {
    let ids = lock_db(&state)?.exists(&request.ids)?;
    Ok(Json(ExistsResponse { ids }))
}

async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PhotoRecord>, ServerError> {
    let record = lock_db(&state)?.get_photo(PhotoId(id))?;
    Ok(Json(record))
}

/// Logical delete: owner or moderation action. The record stays on disk
/// with `status = removed` and drops out of selection.
async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    lock_db(&state)?.set_status(PhotoId(id), PhotoStatus::Removed)?;
    info!(id = %id, "photo removed");
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    lock_db(&state)?.update_location(PhotoId(id), request.owner, request.location.as_ref())?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn like_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LikeRequest>,
) -> Result<Json<LikeResponse>, ServerError> {
    if request.delta != 1 && request.delta != -1 {
        return Err(ServerError::BadRequest(
            "delta must be +1 or -1".to_string(),
        ));
    }

    let id = PhotoId(id);
    let (like_count, record) = {
        let db = lock_db(&state)?;
        let like_count = db.increment_like_count(id, request.delta)?;
        let record = db.get_photo(id)?;
        (like_count, record)
    };

    if request.delta > 0 {
        // Fire-and-forget; delivery mechanics are the collaborator's
        // problem.
        state
            .push
            .notify_like(record.owner, record.location.as_ref().map(|l| l.label()));
    }

    Ok(Json(LikeResponse { like_count }))
}

async fn record_impression(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    lock_db(&state)?.increment_impressions(PhotoId(id))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
