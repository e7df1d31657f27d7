use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::AppResult,
    models::{ObservedProvider, Report, Title, TitleAvailability},
    services::{
        availability::AvailabilityFetcher,
        coverage::CoverageIndex,
        enumerator::{ComboEnumerator, EnumerationLimits},
        provider_directory::ProviderDirectory,
        ranker::BundleRanker,
    },
};

/// Runs the full pipeline: fetch availability, index coverage, enumerate
/// bundles and rank them
///
/// Everything after the fetch is synchronous and deterministic, so two runs
/// over the same catalog snapshot produce identical reports.
#[derive(Clone)]
pub struct Optimizer {
    fetcher: AvailabilityFetcher,
    directory: Arc<dyn ProviderDirectory>,
    limits: EnumerationLimits,
}

impl Optimizer {
    pub fn new(
        fetcher: AvailabilityFetcher,
        directory: Arc<dyn ProviderDirectory>,
        limits: EnumerationLimits,
    ) -> Self {
        Self {
            fetcher,
            directory,
            limits,
        }
    }

    pub async fn optimize(&self, watchlist: &[Title], region: &str) -> AppResult<Report> {
        if watchlist.is_empty() {
            tracing::info!(region = %region, "Empty watchlist, nothing to optimize");
            return Ok(Report::empty());
        }

        let start = Instant::now();
        tracing::info!(
            titles = watchlist.len(),
            region = %region,
            "Starting optimization"
        );

        let fetched = self.fetcher.fetch_all(watchlist, region).await?;

        let index = CoverageIndex::build(&fetched.results);
        tracing::info!(
            providers = index.provider_count(),
            uncovered = index.uncovered().len(),
            "Coverage index built"
        );

        let sizes = ComboEnumerator::new(&index, self.directory.as_ref()).enumerate(self.limits);
        let observed = observed_providers(&fetched.results);
        let report = BundleRanker::new(&index).rank(sizes, fetched.failed_count, observed);

        tracing::info!(
            bundles = report.bundles.len(),
            best_coverage = report.best_bundle().map(|b| b.coverage).unwrap_or(0),
            failed = report.failed_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Optimization completed"
        );

        Ok(report)
    }
}

/// Distinct providers with a subscription offer, ascending by id. Name and
/// logo come from the first offer that carried them.
fn observed_providers(results: &[TitleAvailability]) -> Vec<ObservedProvider> {
    let mut seen: BTreeMap<i64, ObservedProvider> = BTreeMap::new();

    for offer in results.iter().flat_map(|r| r.offers.flatrate()) {
        let entry = seen
            .entry(offer.provider_id)
            .or_insert_with(|| ObservedProvider {
                provider_id: offer.provider_id,
                name: None,
                logo_path: None,
            });
        if entry.name.is_none() {
            entry.name = offer.provider_name.clone();
        }
        if entry.logo_path.is_none() {
            entry.logo_path = offer.logo_path.clone();
        }
    }

    seen.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{MediaType, OfferKind, OfferSet, ProviderMeta, ProviderOffer, TitleKey};
    use crate::services::provider_directory::ProviderTable;
    use crate::services::providers::{CatalogError, CatalogSource};
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Fixed catalog: title id -> flatrate provider ids. Titles listed in
    /// `stalled` never answer; titles missing from `offers` are not found.
    struct FixtureCatalog {
        offers: HashMap<i64, Vec<i64>>,
        stalled: HashSet<i64>,
        unreachable: bool,
    }

    impl FixtureCatalog {
        fn new(offers: &[(i64, &[i64])]) -> Self {
            Self {
                offers: offers.iter().map(|(id, p)| (*id, p.to_vec())).collect(),
                stalled: HashSet::new(),
                unreachable: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl CatalogSource for FixtureCatalog {
        async fn fetch_offers(
            &self,
            title: &TitleKey,
            _region: &str,
        ) -> Result<OfferSet, CatalogError> {
            if self.unreachable {
                return Err(CatalogError::Transient("connection refused".to_string()));
            }
            if self.stalled.contains(&title.id) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            // Shuffle completion order a little
            tokio::time::sleep(Duration::from_millis((title.id as u64 * 7) % 13)).await;

            match self.offers.get(&title.id) {
                Some(ids) => {
                    let mut offers: Vec<ProviderOffer> = ids
                        .iter()
                        .map(|&id| ProviderOffer {
                            provider_id: id,
                            kind: OfferKind::Flatrate,
                            provider_name: Some(format!("Provider {}", id)),
                            logo_path: None,
                        })
                        .collect();
                    offers.push(ProviderOffer {
                        provider_id: 2,
                        kind: OfferKind::Rent,
                        provider_name: Some("Rental Store".to_string()),
                        logo_path: None,
                    });
                    Ok(OfferSet::new(offers))
                }
                None => Err(CatalogError::NotFound(*title)),
            }
        }

        fn name(&self) -> &'static str {
            "fixture"
        }
    }

    fn watchlist(names: &[&str]) -> Vec<Title> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Title::new(i as i64 + 1, MediaType::Movie, *name))
            .collect()
    }

    fn optimizer(
        catalog: FixtureCatalog,
        table: ProviderTable,
        limits: EnumerationLimits,
    ) -> Optimizer {
        let fetcher = AvailabilityFetcher::new(Arc::new(catalog), 5, Duration::from_millis(200));
        Optimizer::new(fetcher, Arc::new(table), limits)
    }

    fn scenario_table() -> ProviderTable {
        ProviderTable::from_entries([
            ProviderMeta::new(1, "P1", Some(100)),
            ProviderMeta::new(3, "P3", Some(150)),
        ])
    }

    #[tokio::test]
    async fn test_empty_watchlist() {
        let optimizer = optimizer(
            FixtureCatalog::new(&[]),
            scenario_table(),
            EnumerationLimits::default(),
        );
        let report = assert_ok!(optimizer.optimize(&[], "EG").await);
        assert_eq!(report, Report::empty());
    }

    #[tokio::test]
    async fn test_single_title_single_provider() {
        let optimizer = optimizer(
            FixtureCatalog::new(&[(1, &[1])]),
            scenario_table(),
            EnumerationLimits::default(),
        );

        let report = assert_ok!(optimizer.optimize(&watchlist(&["Solo"]), "EG").await);
        assert_eq!(report.bundles.len(), 1);
        assert_eq!(report.bundles[0].coverage, 1);
        assert_eq!(report.bundles[0].total_cost_cents, 100);
        assert!(!report.bundles[0].cost_unknown);
        assert!(report.uncovered_titles.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_title_joins_uncovered() {
        let mut catalog = FixtureCatalog::new(&[(1, &[1, 3]), (2, &[1]), (3, &[3])]);
        catalog.stalled.insert(2);
        let optimizer = optimizer(catalog, scenario_table(), EnumerationLimits::default());

        let report = assert_ok!(optimizer.optimize(&watchlist(&["A", "B", "C"]), "EG").await);

        assert_eq!(report.failed_count, 1);
        assert_eq!(report.total_titles, 3);
        let uncovered: Vec<&str> = report
            .uncovered_titles
            .iter()
            .map(|t| t.display_name.as_str())
            .collect();
        assert_eq!(uncovered, vec!["B"]);

        // A and C still count
        assert_eq!(report.bundles[0].provider_ids, vec![3]);
        assert_eq!(report.bundles[0].covered_titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_fails_the_run() {
        let mut catalog = FixtureCatalog::new(&[(1, &[1])]);
        catalog.unreachable = true;
        let optimizer = optimizer(catalog, scenario_table(), EnumerationLimits::default());

        let err = assert_err!(optimizer.optimize(&watchlist(&["A", "B"]), "EG").await);
        assert!(matches!(err, AppError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_observed_providers_exclude_rent_only() {
        let optimizer = optimizer(
            FixtureCatalog::new(&[(1, &[8]), (2, &[337, 8])]),
            scenario_table(),
            EnumerationLimits::default(),
        );

        let report = assert_ok!(optimizer.optimize(&watchlist(&["A", "B"]), "EG").await);
        let ids: Vec<i64> = report.observed_providers.iter().map(|p| p.provider_id).collect();
        assert_eq!(ids, vec![8, 337]);
        assert_eq!(report.observed_providers[0].name.as_deref(), Some("Provider 8"));
    }

    /// Deterministic pseudo-random catalog: 40 titles over 12 providers
    fn generated_catalog(seed: u64) -> Vec<(i64, Vec<i64>)> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            state >> 33
        };

        (1..=40)
            .map(|title| {
                let providers = (1..=12).filter(|_| next() % 5 == 0).collect();
                (title, providers)
            })
            .collect()
    }

    fn generated_optimizer(seed: u64, limits: EnumerationLimits) -> (Optimizer, Vec<Title>) {
        let rows = generated_catalog(seed);
        let borrowed: Vec<(i64, &[i64])> = rows.iter().map(|(id, p)| (*id, p.as_slice())).collect();
        let table = ProviderTable::from_entries(
            (1..=12).map(|id| ProviderMeta::new(id, format!("P{}", id), Some(100 * id as u32))),
        );
        let titles: Vec<Title> = (1..=40)
            .map(|id| Title::new(id, MediaType::Movie, format!("Title {}", id)))
            .collect();
        (optimizer(FixtureCatalog::new(&borrowed), table, limits), titles)
    }

    #[tokio::test]
    async fn test_coverage_is_monotonic_in_bundle_size() {
        for seed in [1, 7, 42] {
            let (optimizer, titles) = generated_optimizer(seed, EnumerationLimits::default());
            let report = assert_ok!(optimizer.optimize(&titles, "EG").await);

            for pair in report.bundles.windows(2) {
                assert!(
                    pair[1].coverage >= pair[0].coverage,
                    "seed {}: size {} covers less than size {}",
                    seed,
                    pair[1].size,
                    pair[0].size
                );
            }
        }
    }

    #[tokio::test]
    async fn test_greedy_fallback_is_monotonic() {
        let limits = EnumerationLimits {
            max_bundle_size: 6,
            exhaustive_ceiling: 4,
        };
        let (optimizer, titles) = generated_optimizer(9, limits);
        let report = assert_ok!(optimizer.optimize(&titles, "EG").await);

        assert!(report.bundles.iter().all(|b| b.strategy == crate::models::SearchStrategy::Greedy));
        for pair in report.bundles.windows(2) {
            assert!(pair[1].coverage >= pair[0].coverage);
        }
    }

    #[tokio::test]
    async fn test_covered_titles_match_provider_union() {
        let rows = generated_catalog(3);
        let (optimizer, titles) = generated_optimizer(3, EnumerationLimits::default());
        let report = assert_ok!(optimizer.optimize(&titles, "EG").await);

        for bundle in &report.bundles {
            let expected: BTreeSet<String> = rows
                .iter()
                .filter(|(_, providers)| providers.iter().any(|p| bundle.provider_ids.contains(p)))
                .map(|(id, _)| format!("Title {}", id))
                .collect();
            let actual: BTreeSet<String> = bundle.covered_titles.iter().cloned().collect();

            assert_eq!(actual, expected, "size {}", bundle.size);
            assert_eq!(bundle.coverage, expected.len());
        }
    }

    #[tokio::test]
    async fn test_repeated_runs_are_byte_identical() {
        let (optimizer, titles) = generated_optimizer(11, EnumerationLimits::default());

        let first = assert_ok!(optimizer.optimize(&titles, "EG").await);
        let second = assert_ok!(optimizer.optimize(&titles, "EG").await);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_uncovered_titles_fixed_across_sizes() {
        let (optimizer, titles) = generated_optimizer(5, EnumerationLimits::default());
        let report = assert_ok!(optimizer.optimize(&titles, "EG").await);

        let uncovered: HashSet<i64> = report.uncovered_titles.iter().map(|t| t.id).collect();
        for bundle in &report.bundles {
            for name in &bundle.covered_titles {
                let id: i64 = name.trim_start_matches("Title ").parse().unwrap();
                assert!(!uncovered.contains(&id));
            }
        }
    }
}
