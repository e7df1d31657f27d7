use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{MediaType, NewWatchlistEntry, TitleId, WatchlistEntry},
    routes::AppState,
};

/// GET /api/watchlist
pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<WatchlistEntry>>> {
    Ok(Json(state.watchlist.list().await?))
}

/// POST /api/watchlist
pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(entry): Json<NewWatchlistEntry>,
) -> AppResult<(StatusCode, Json<Vec<WatchlistEntry>>)> {
    if entry.id <= 0 {
        return Err(AppError::InvalidInput(format!(
            "Invalid title id: {}",
            entry.id
        )));
    }

    tracing::info!(
        request_id = %request_id,
        id = entry.id,
        media_type = %entry.media_type,
        "Adding title to watchlist"
    );

    let list = state.watchlist.add(entry.into_entry(Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// DELETE /api/watchlist/:media_type/:id
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((media_type, id)): Path<(String, TitleId)>,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    let media_type: MediaType = media_type.parse()?;

    tracing::info!(
        request_id = %request_id,
        id,
        media_type = %media_type,
        "Removing title from watchlist"
    );

    Ok(Json(state.watchlist.remove(media_type, id).await?))
}
