use std::{sync::Arc, time::Duration};

use futures::stream::{self, StreamExt};

use crate::{
    error::{AppError, AppResult},
    models::{CatalogErrorKind, FetchFailure, FetchReport, Title, TitleAvailability},
    services::providers::{CatalogError, CatalogSource},
};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 5;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves provider offers for every watchlist title against a catalog source
///
/// At most `concurrency` lookups are in flight at once. Each lookup has its
/// own timeout, and a failed lookup marks only its own title unavailable.
/// Nothing is spawned: dropping the future returned by [`fetch_all`] cancels
/// every lookup still pending.
///
/// [`fetch_all`]: AvailabilityFetcher::fetch_all
#[derive(Clone)]
pub struct AvailabilityFetcher {
    catalog: Arc<dyn CatalogSource>,
    concurrency: usize,
    timeout: Duration,
}

impl AvailabilityFetcher {
    pub fn new(catalog: Arc<dyn CatalogSource>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            catalog,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Fetches availability for all titles, returning results in input order
    ///
    /// Fails only when every lookup failed and none of the failures was a
    /// "not found" answer, i.e. the catalog could not be reached at all.
    pub async fn fetch_all(&self, titles: &[Title], region: &str) -> AppResult<FetchReport> {
        tracing::info!(
            title_count = titles.len(),
            region = %region,
            catalog = self.catalog.name(),
            concurrency = self.concurrency,
            "Fetching availability batch"
        );

        // `buffered` yields in input order regardless of completion order
        let results: Vec<TitleAvailability> = stream::iter(
            titles
                .iter()
                .map(|title| self.fetch_one(title, region))
                .collect::<Vec<_>>(),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let failed_count = results.iter().filter(|r| r.unavailable).count();

        if failed_count > 0 {
            tracing::warn!(
                success_count = results.len() - failed_count,
                error_count = failed_count,
                "Partial availability fetch failure"
            );
        }

        if !results.is_empty() && failed_count == results.len() && !any_not_found(&results) {
            return Err(AppError::CatalogUnavailable(
                "Failed to fetch availability for any title".to_string(),
            ));
        }

        tracing::info!(
            fetched = results.len() - failed_count,
            failed = failed_count,
            "Availability data fetched"
        );

        Ok(FetchReport {
            results,
            failed_count,
        })
    }

    async fn fetch_one(&self, title: &Title, region: &str) -> TitleAvailability {
        let key = title.key();

        let outcome =
            match tokio::time::timeout(self.timeout, self.catalog.fetch_offers(&key, region)).await
            {
                Ok(result) => result,
                Err(_) => Err(CatalogError::Timeout(self.timeout)),
            };

        match outcome {
            Ok(offers) => {
                tracing::debug!(title = %key, offers = offers.offers.len(), "Availability fetched");
                TitleAvailability::available(title.clone(), offers)
            }
            Err(e) => {
                tracing::warn!(
                    title = %key,
                    kind = ?e.kind(),
                    error = %e,
                    "Availability fetch failed for title"
                );
                TitleAvailability::failed(
                    title.clone(),
                    FetchFailure {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                )
            }
        }
    }
}

fn any_not_found(results: &[TitleAvailability]) -> bool {
    results.iter().any(|r| {
        r.failure
            .as_ref()
            .is_some_and(|f| f.kind == CatalogErrorKind::NotFound)
    })
}
