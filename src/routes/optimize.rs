use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{ObservedProvider, ProviderId, RankedBundle, Report, SearchStrategy, Title},
    routes::AppState,
    services::ProviderDirectory,
};

#[derive(Debug, Deserialize)]
pub struct OptimizeQuery {
    region: Option<String>,
}

/// A provider as shown next to a bundle
#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub provider_id: ProviderId,
    pub name: String,
    pub logo_path: Option<String>,
    pub monthly_cost_cents: Option<u32>,
    /// Whether the provider has a configured price
    pub configured: bool,
    pub search_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BundleView {
    pub size: usize,
    pub provider_ids: Vec<ProviderId>,
    pub providers: Vec<ProviderView>,
    pub coverage: usize,
    pub percentage: u32,
    pub total_cost_cents: u64,
    pub cost_unknown: bool,
    pub recommended: bool,
    pub covered_titles: Vec<String>,
    pub strategy: SearchStrategy,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub region: String,
    pub total_titles: usize,
    pub failed_count: usize,
    pub bundles: Vec<BundleView>,
    pub uncovered_titles: Vec<Title>,
    pub all_providers: Vec<ProviderView>,
}

/// Handler for optimization endpoint
///
/// Runs on a snapshot of the stored watchlist.
pub async fn optimize(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<OptimizeQuery>,
) -> AppResult<Json<OptimizeResponse>> {
    let region = state.region(params.region.as_deref())?;
    let watchlist = state.watchlist.list_titles().await?;

    tracing::info!(
        request_id = %request_id,
        region = %region,
        titles = watchlist.len(),
        "Processing optimization request"
    );

    let report = state.optimizer.optimize(&watchlist, &region).await?;

    tracing::info!(
        request_id = %request_id,
        bundles = report.bundles.len(),
        failed = report.failed_count,
        "Optimization completed"
    );

    Ok(Json(present(report, region, state.directory.as_ref())))
}

fn present(
    report: Report,
    region: String,
    directory: &dyn ProviderDirectory,
) -> OptimizeResponse {
    let bundles = report
        .bundles
        .iter()
        .map(|bundle| bundle_view(bundle, directory, &report.observed_providers))
        .collect();

    let all_providers = report
        .observed_providers
        .iter()
        .map(|p| provider_view(p.provider_id, directory, Some(p)))
        .collect();

    OptimizeResponse {
        region,
        total_titles: report.total_titles,
        failed_count: report.failed_count,
        bundles,
        uncovered_titles: report.uncovered_titles,
        all_providers,
    }
}

fn bundle_view(
    bundle: &RankedBundle,
    directory: &dyn ProviderDirectory,
    observed: &[ObservedProvider],
) -> BundleView {
    BundleView {
        size: bundle.size,
        provider_ids: bundle.provider_ids.clone(),
        providers: bundle
            .provider_ids
            .iter()
            .map(|&id| {
                let seen = observed.iter().find(|p| p.provider_id == id);
                provider_view(id, directory, seen)
            })
            .collect(),
        coverage: bundle.coverage,
        percentage: bundle.percentage,
        total_cost_cents: bundle.total_cost_cents,
        cost_unknown: bundle.cost_unknown,
        recommended: bundle.recommended,
        covered_titles: bundle.covered_titles.clone(),
        strategy: bundle.strategy,
    }
}

/// Metadata table first, then what the catalog reported, then the bare id
fn provider_view(
    id: ProviderId,
    directory: &dyn ProviderDirectory,
    observed: Option<&ObservedProvider>,
) -> ProviderView {
    let meta = directory.lookup(id);

    let name = meta
        .map(|m| m.name.clone())
        .or_else(|| observed.and_then(|o| o.name.clone()))
        .unwrap_or_else(|| format!("Provider {}", id));

    let logo_path = meta
        .and_then(|m| m.logo_path.clone())
        .or_else(|| observed.and_then(|o| o.logo_path.clone()));

    let monthly_cost_cents = meta.and_then(|m| m.monthly_cost_cents);

    ProviderView {
        provider_id: id,
        name,
        logo_path,
        monthly_cost_cents,
        configured: monthly_cost_cents.is_some(),
        search_url: meta.and_then(|m| m.search_url.clone()),
    }
}
