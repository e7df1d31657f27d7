use serde::Serialize;

use super::{ProviderId, Title};

/// How the winning bundle of a given size was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Exhaustive,
    Greedy,
}

/// The winning bundle for one bundle size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBundle {
    pub size: usize,
    /// Sorted ascending
    pub provider_ids: Vec<ProviderId>,
    pub coverage: usize,
    /// `coverage / total_titles` as a whole percent, rounded half up
    pub percentage: u32,
    /// Sum of known monthly costs
    pub total_cost_cents: u64,
    /// Set when at least one member has no configured price
    pub cost_unknown: bool,
    /// Set only when this size covers more titles than the previous size
    pub recommended: bool,
    /// Display names in watchlist order
    pub covered_titles: Vec<String>,
    pub strategy: SearchStrategy,
}

/// A provider seen offering at least one watchlist title by subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedProvider {
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub logo_path: Option<String>,
}

/// Result of one optimization run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total_titles: usize,
    pub failed_count: usize,
    pub bundles: Vec<RankedBundle>,
    pub uncovered_titles: Vec<Title>,
    pub observed_providers: Vec<ObservedProvider>,
}

impl Report {
    /// The "nothing to optimize" report for an empty watchlist
    pub fn empty() -> Self {
        Self {
            total_titles: 0,
            failed_count: 0,
            bundles: Vec::new(),
            uncovered_titles: Vec::new(),
            observed_providers: Vec::new(),
        }
    }

    /// The smallest bundle reaching the best coverage on offer
    pub fn best_bundle(&self) -> Option<&RankedBundle> {
        self.bundles.iter().rev().find(|b| b.recommended)
    }
}
