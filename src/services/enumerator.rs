use crate::{
    models::{ProviderId, SearchStrategy},
    services::{
        coverage::{CoverageIndex, TitleMask},
        provider_directory::ProviderDirectory,
    },
};

/// Exhaustive search is C(N, k) per size; past this many providers it is greedy
pub const DEFAULT_EXHAUSTIVE_CEILING: usize = 15;
/// Sizes run up to the provider count, never past the exhaustive ceiling
pub const DEFAULT_MAX_BUNDLE_SIZE: usize = DEFAULT_EXHAUSTIVE_CEILING;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationLimits {
    pub max_bundle_size: usize,
    pub exhaustive_ceiling: usize,
}

impl Default for EnumerationLimits {
    fn default() -> Self {
        Self {
            max_bundle_size: DEFAULT_MAX_BUNDLE_SIZE,
            exhaustive_ceiling: DEFAULT_EXHAUSTIVE_CEILING,
        }
    }
}

/// Summed monthly cost of a bundle
///
/// Providers without a price add nothing to `known_cents` but clear
/// `complete`, so a partial sum is never mistaken for the real price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BundleCost {
    pub known_cents: u64,
    pub complete: bool,
}

impl BundleCost {
    pub fn zero() -> Self {
        Self {
            known_cents: 0,
            complete: true,
        }
    }

    pub fn add(self, price: Option<u32>) -> Self {
        match price {
            Some(cents) => Self {
                known_cents: self.known_cents + u64::from(cents),
                complete: self.complete,
            },
            None => Self {
                known_cents: self.known_cents,
                complete: false,
            },
        }
    }

    /// Cheaper first; any fully priced bundle before any partially priced one
    pub fn rank_key(&self) -> (bool, u64) {
        (!self.complete, self.known_cents)
    }
}

/// One scored provider combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Ascending
    pub provider_ids: Vec<ProviderId>,
    pub covered: TitleMask,
    pub coverage: usize,
    pub cost: BundleCost,
}

/// Every candidate considered for one bundle size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeCandidates {
    pub size: usize,
    pub strategy: SearchStrategy,
    pub candidates: Vec<Candidate>,
}

struct ProviderEntry {
    id: ProviderId,
    mask: TitleMask,
    price: Option<u32>,
}

/// Enumerates provider bundles of each size and scores them by coverage and cost
pub struct ComboEnumerator<'a> {
    index: &'a CoverageIndex,
    providers: Vec<ProviderEntry>,
}

impl<'a> ComboEnumerator<'a> {
    pub fn new(index: &'a CoverageIndex, directory: &dyn ProviderDirectory) -> Self {
        let providers = index
            .provider_ids()
            .map(|id| ProviderEntry {
                id,
                mask: index.mask_for(id),
                price: directory.monthly_cost_cents(id),
            })
            .collect();

        Self { index, providers }
    }

    /// Candidates for sizes `1..=K`, `K = min(max_bundle_size, providers)`.
    /// `max_bundle_size` defaults to the exhaustive ceiling.
    pub fn enumerate(&self, limits: EnumerationLimits) -> Vec<SizeCandidates> {
        let provider_count = self.providers.len();
        let max_size = limits.max_bundle_size.min(provider_count);
        if max_size == 0 {
            return Vec::new();
        }

        if provider_count > limits.exhaustive_ceiling {
            tracing::info!(
                providers = provider_count,
                ceiling = limits.exhaustive_ceiling,
                "Provider count above exhaustive ceiling, using greedy search"
            );
            return self
                .greedy(max_size)
                .into_iter()
                .enumerate()
                .map(|(i, candidate)| SizeCandidates {
                    size: i + 1,
                    strategy: SearchStrategy::Greedy,
                    candidates: vec![candidate],
                })
                .collect();
        }

        (1..=max_size)
            .map(|size| {
                let candidates = self.exhaustive(size);
                tracing::debug!(size, candidates = candidates.len(), "Enumerated bundles");
                SizeCandidates {
                    size,
                    strategy: SearchStrategy::Exhaustive,
                    candidates,
                }
            })
            .collect()
    }

    /// All `size`-subsets of the providers, in lexicographic id order
    fn exhaustive(&self, size: usize) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for_each_combination(self.providers.len(), size, |members| {
            candidates.push(self.score(members));
        });
        candidates
    }

    /// Nested bundles of size 1..=max_size. Each step adds the provider with
    /// the most not-yet-covered titles, then the cheapest, then the lowest id.
    fn greedy(&self, max_size: usize) -> Vec<Candidate> {
        let mut chosen: Vec<usize> = Vec::with_capacity(max_size);
        let mut covered = TitleMask::empty(self.index.total_titles());
        let mut bundles = Vec::with_capacity(max_size);

        for _ in 0..max_size {
            let next = self
                .providers
                .iter()
                .enumerate()
                .filter(|(i, _)| !chosen.contains(i))
                .max_by(|(_, a), (_, b)| {
                    a.mask
                        .count_new(&covered)
                        .cmp(&b.mask.count_new(&covered))
                        .then_with(|| price_key(b.price).cmp(&price_key(a.price)))
                        .then_with(|| b.id.cmp(&a.id))
                })
                .map(|(i, _)| i);

            let Some(next) = next else { break };
            covered.union_with(&self.providers[next].mask);
            chosen.push(next);

            let mut members = chosen.clone();
            members.sort_unstable();
            bundles.push(self.score(&members));
        }

        bundles
    }

    /// `members` are ascending positions into `self.providers`
    fn score(&self, members: &[usize]) -> Candidate {
        let mut covered = TitleMask::empty(self.index.total_titles());
        let mut cost = BundleCost::zero();
        let mut provider_ids = Vec::with_capacity(members.len());

        for &i in members {
            let provider = &self.providers[i];
            covered.union_with(&provider.mask);
            cost = cost.add(provider.price);
            provider_ids.push(provider.id);
        }

        Candidate {
            provider_ids,
            coverage: covered.count(),
            covered,
            cost,
        }
    }
}

fn price_key(price: Option<u32>) -> (bool, u32) {
    (price.is_none(), price.unwrap_or(0))
}

/// Calls `f` with every ascending `k`-combination of `0..n`
fn for_each_combination(n: usize, k: usize, mut f: impl FnMut(&[usize])) {
    if k == 0 || k > n {
        return;
    }

    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        f(&indices);

        // Rightmost position that can still move right
        let Some(pos) = (0..k).rev().find(|&i| indices[i] != i + n - k) else {
            return;
        };
        indices[pos] += 1;
        for i in pos + 1..k {
            indices[i] = indices[i - 1] + 1;
        }
    }
}
