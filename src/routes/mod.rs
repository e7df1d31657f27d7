use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::{AppError, AppResult},
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{
        EpisodeCalendar, FilmographyLookup, Optimizer, ProviderDirectory, TitleCatalog,
        WatchlistStore,
    },
};

pub mod browse;
pub mod optimize;
pub mod providers;
pub mod watchlist;

/// Shared handler state
pub struct AppState {
    pub watchlist: Arc<dyn WatchlistStore>,
    pub directory: Arc<dyn ProviderDirectory>,
    pub catalog: Arc<dyn TitleCatalog>,
    pub optimizer: Arc<Optimizer>,
    pub calendar: EpisodeCalendar,
    pub filmography: FilmographyLookup,
    /// Region used when a request does not name one
    pub default_region: String,
}

impl AppState {
    /// The requested region, or the default; two ASCII letters, upper-cased
    pub fn region(&self, requested: Option<&str>) -> AppResult<String> {
        normalize_region(requested.unwrap_or(&self.default_region))
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/watchlist", get(watchlist::list).post(watchlist::add))
        .route("/watchlist/:media_type/:id", delete(watchlist::remove))
        .route("/optimize", get(optimize::optimize))
        .route("/providers", get(providers::list))
        .route("/providers/:id/link", get(providers::link))
        .route("/search", get(browse::search))
        .route("/details/:media_type/:id", get(browse::details))
        .route("/person/:id", get(browse::person))
        .route("/person/:id/availability", get(browse::person_availability))
        .route("/calendar", get(browse::calendar))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// ISO 3166-1 alpha-2, upper-cased
fn normalize_region(region: &str) -> AppResult<String> {
    let region = region.trim();
    if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidInput(format!(
            "Invalid region code: {}",
            region
        )));
    }
    Ok(region.to_ascii_uppercase())
}
