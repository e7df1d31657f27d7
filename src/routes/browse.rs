use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, PersonId, SearchKind, SearchPage, TitleDetails, TitleId, TitleKey},
    routes::AppState,
    services::{
        calendar::CalendarReport,
        filmography::{PersonAvailability, PersonProfile},
    },
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    region: Option<String>,
}

/// GET /api/search?q=&type=&page=
///
/// A blank query answers with an empty page without calling the catalog.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchPage>> {
    let kind = match params.kind.as_deref() {
        Some(kind) => kind.parse::<SearchKind>()?,
        None => SearchKind::default(),
    };

    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(SearchPage::empty()));
    }

    let page = params.page.unwrap_or(1).max(1);
    Ok(Json(state.catalog.search(query, kind, page).await?))
}

/// GET /api/details/:media_type/:id?region=
pub async fn details(
    State(state): State<Arc<AppState>>,
    Path((media_type, id)): Path<(String, TitleId)>,
    Query(params): Query<RegionQuery>,
) -> AppResult<Json<TitleDetails>> {
    let media_type: MediaType = media_type.parse()?;
    let region = state.region(params.region.as_deref())?;
    let key = TitleKey::new(valid_id(id)?, media_type);

    Ok(Json(state.catalog.details(&key, &region).await?))
}

/// GET /api/person/:id
pub async fn person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PersonId>,
) -> AppResult<Json<PersonProfile>> {
    Ok(Json(state.filmography.profile(valid_id(id)?).await?))
}

/// GET /api/person/:id/availability?region=
pub async fn person_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PersonId>,
    Query(params): Query<RegionQuery>,
) -> AppResult<Json<PersonAvailability>> {
    let region = state.region(params.region.as_deref())?;
    Ok(Json(
        state
            .filmography
            .availability(valid_id(id)?, &region)
            .await?,
    ))
}

/// GET /api/calendar
///
/// Upcoming episodes of the TV shows on the watchlist.
pub async fn calendar(State(state): State<Arc<AppState>>) -> AppResult<Json<CalendarReport>> {
    let titles = state.watchlist.list_titles().await?;
    let today = Utc::now().date_naive();

    Ok(Json(state.calendar.upcoming(&titles, today).await))
}

fn valid_id(id: i64) -> AppResult<i64> {
    if id <= 0 {
        return Err(AppError::InvalidInput(format!("Invalid id: {}", id)));
    }
    Ok(id)
}
