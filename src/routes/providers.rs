use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, ProviderId, ProviderMeta, RegionProvider},
    routes::AppState,
};

/// A provider offered in the region, the price table, or both
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEntry {
    pub provider_id: ProviderId,
    pub name: String,
    pub logo_path: Option<String>,
    pub monthly_cost_cents: Option<u32>,
    /// Whether a monthly price is configured
    pub configured: bool,
    /// Whether the catalog lists the provider for the region
    pub in_region: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProvidersQuery {
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    title: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub provider_id: ProviderId,
    pub url: String,
}

/// GET /api/providers?region=
///
/// The region's movie and TV providers merged, in catalog order, followed by
/// table rows the region does not list.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProvidersQuery>,
) -> AppResult<Json<Vec<ProviderEntry>>> {
    let region = state.region(params.region.as_deref())?;

    let (movie, tv) = tokio::try_join!(
        state.catalog.region_providers(MediaType::Movie, &region),
        state.catalog.region_providers(MediaType::Tv, &region),
    )?;

    let entries = merge_providers(movie.into_iter().chain(tv), state.directory.all());
    tracing::debug!(region = %region, providers = entries.len(), "Listing providers");

    Ok(Json(entries))
}

/// GET /api/providers/:id/link?title=
///
/// Search page for a title on the provider's site, or the generic catalog
/// search when the provider has no mapping.
pub async fn link(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<ProviderId>,
    Query(params): Query<LinkQuery>,
) -> AppResult<Json<LinkResponse>> {
    let title = params.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
    }

    Ok(Json(LinkResponse {
        provider_id,
        url: state.directory.provider_link(provider_id, title),
    }))
}

fn merge_providers(
    region: impl IntoIterator<Item = RegionProvider>,
    table: Vec<&ProviderMeta>,
) -> Vec<ProviderEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for provider in region {
        if !seen.insert(provider.provider_id) {
            continue;
        }
        let meta = table
            .iter()
            .find(|m| m.provider_id == provider.provider_id);
        entries.push(ProviderEntry {
            provider_id: provider.provider_id,
            name: meta.map_or(provider.provider_name, |m| m.name.clone()),
            logo_path: provider
                .logo_path
                .or_else(|| meta.and_then(|m| m.logo_path.clone())),
            monthly_cost_cents: meta.and_then(|m| m.monthly_cost_cents),
            configured: meta.is_some_and(|m| m.is_priced()),
            in_region: true,
        });
    }

    entries.extend(
        table
            .into_iter()
            .filter(|m| !seen.contains(&m.provider_id))
            .map(|m| ProviderEntry {
                provider_id: m.provider_id,
                name: m.name.clone(),
                logo_path: m.logo_path.clone(),
                monthly_cost_cents: m.monthly_cost_cents,
                configured: m.is_priced(),
                in_region: false,
            }),
    );

    entries
}
