use std::cmp::Ordering;

use crate::{
    models::{ObservedProvider, RankedBundle, Report},
    services::{
        coverage::CoverageIndex,
        enumerator::{Candidate, SizeCandidates},
    },
};

/// Orders candidates best first: more coverage, then fully priced before
/// partially priced, then cheaper, then the smaller sorted id sequence.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.coverage
        .cmp(&a.coverage)
        .then_with(|| a.cost.rank_key().cmp(&b.cost.rank_key()))
        .then_with(|| a.provider_ids.cmp(&b.provider_ids))
}

/// Picks one winner per bundle size and assembles the report
pub struct BundleRanker<'a> {
    index: &'a CoverageIndex,
}

impl<'a> BundleRanker<'a> {
    pub fn new(index: &'a CoverageIndex) -> Self {
        Self { index }
    }

    pub fn rank(
        &self,
        sizes: Vec<SizeCandidates>,
        failed_count: usize,
        observed_providers: Vec<ObservedProvider>,
    ) -> Report {
        let total_titles = self.index.total_titles();
        let mut previous_coverage = 0;
        let mut bundles = Vec::with_capacity(sizes.len());

        for size in sizes {
            let Some(winner) = size.candidates.iter().min_by(|a, b| compare_candidates(a, b))
            else {
                continue;
            };

            let recommended = winner.coverage > previous_coverage;
            previous_coverage = previous_coverage.max(winner.coverage);

            tracing::debug!(
                size = size.size,
                providers = ?winner.provider_ids,
                coverage = winner.coverage,
                cost_cents = winner.cost.known_cents,
                recommended,
                "Selected bundle"
            );

            bundles.push(RankedBundle {
                size: size.size,
                provider_ids: winner.provider_ids.clone(),
                coverage: winner.coverage,
                percentage: percentage(winner.coverage, total_titles),
                total_cost_cents: winner.cost.known_cents,
                cost_unknown: !winner.cost.complete,
                recommended,
                covered_titles: self
                    .index
                    .titles_in(&winner.covered)
                    .map(|t| t.display_name.clone())
                    .collect(),
                strategy: size.strategy,
            });
        }

        Report {
            total_titles,
            failed_count,
            bundles,
            uncovered_titles: self.index.uncovered_titles(),
            observed_providers,
        }
    }
}

/// `coverage * 100 / total`, rounded half up
pub fn percentage(coverage: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (200 * coverage as u64 + total as u64) / (2 * total as u64);
    pct as u32
}
