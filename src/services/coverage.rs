use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::models::{ProviderId, Title, TitleAvailability, TitleKey};

/// Which watchlist titles each provider covers by subscription
///
/// Built once per optimization run from the fetch results. Only flatrate
/// offers are indexed; a title without any is recorded as uncovered, and that
/// set never changes afterwards. Provider ids are indexed whether or not the
/// metadata table knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageIndex {
    /// Watchlist titles in input order, one per identity
    titles: Vec<Title>,
    positions: HashMap<TitleKey, usize>,
    providers: BTreeMap<ProviderId, BTreeSet<TitleKey>>,
    uncovered: Vec<TitleKey>,
}

impl CoverageIndex {
    pub fn build(results: &[TitleAvailability]) -> Self {
        let mut titles = Vec::with_capacity(results.len());
        let mut positions = HashMap::with_capacity(results.len());
        let mut providers: BTreeMap<ProviderId, BTreeSet<TitleKey>> = BTreeMap::new();

        for result in results {
            let key = result.title.key();
            if !positions.contains_key(&key) {
                positions.insert(key, titles.len());
                titles.push(result.title.clone());
            }

            for offer in result.offers.flatrate() {
                providers.entry(offer.provider_id).or_default().insert(key);
            }
        }

        let covered: HashSet<TitleKey> = providers.values().flatten().copied().collect();
        let uncovered = titles
            .iter()
            .map(Title::key)
            .filter(|key| !covered.contains(key))
            .collect();

        Self {
            titles,
            positions,
            providers,
            uncovered,
        }
    }

    pub fn titles(&self) -> &[Title] {
        &self.titles
    }

    pub fn total_titles(&self) -> usize {
        self.titles.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Distinct provider ids, ascending
    pub fn provider_ids(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.keys().copied()
    }

    pub fn covered_by(&self, provider: ProviderId) -> Option<&BTreeSet<TitleKey>> {
        self.providers.get(&provider)
    }

    /// Titles no provider offers by subscription, in watchlist order
    pub fn uncovered(&self) -> &[TitleKey] {
        &self.uncovered
    }

    pub fn uncovered_titles(&self) -> Vec<Title> {
        self.uncovered
            .iter()
            .filter_map(|key| self.title(key))
            .cloned()
            .collect()
    }

    pub fn title(&self, key: &TitleKey) -> Option<&Title> {
        self.positions.get(key).map(|&pos| &self.titles[pos])
    }

    /// Coverage of one provider as a bitmask over title positions
    pub fn mask_for(&self, provider: ProviderId) -> TitleMask {
        let mut mask = TitleMask::empty(self.titles.len());
        if let Some(keys) = self.providers.get(&provider) {
            for key in keys {
                if let Some(&pos) = self.positions.get(key) {
                    mask.insert(pos);
                }
            }
        }
        mask
    }

    /// Titles selected by `mask`, in watchlist order
    pub fn titles_in<'a>(&'a self, mask: &'a TitleMask) -> impl Iterator<Item = &'a Title> + 'a {
        mask.positions().filter_map(|pos| self.titles.get(pos))
    }
}

/// Fixed-width bitset over watchlist positions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleMask {
    words: Vec<u64>,
}

impl TitleMask {
    pub fn empty(title_count: usize) -> Self {
        Self {
            words: vec![0; title_count.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, pos: usize) {
        self.words[pos / 64] |= 1u64 << (pos % 64);
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.words
            .get(pos / 64)
            .is_some_and(|word| word & (1u64 << (pos % 64)) != 0)
    }

    pub fn union_with(&mut self, other: &TitleMask) {
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= other;
        }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of positions set here but not in `covered`
    pub fn count_new(&self, covered: &TitleMask) -> usize {
        self.words
            .iter()
            .zip(&covered.words)
            .map(|(w, c)| (w & !c).count_ones() as usize)
            .sum()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| i * 64 + bit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CatalogErrorKind, FetchFailure, MediaType, OfferKind, OfferSet, ProviderOffer,
    };

    fn available(id: i64, name: &str, providers: &[i64]) -> TitleAvailability {
        TitleAvailability::available(
            Title::new(id, MediaType::Movie, name),
            OfferSet::new(providers.iter().copied().map(ProviderOffer::flatrate).collect()),
        )
    }

    fn key(id: i64) -> TitleKey {
        TitleKey::new(id, MediaType::Movie)
    }

    #[test]
    fn test_build_watchlist_scenario() {
        let index = CoverageIndex::build(&[
            available(1, "A", &[1, 2]),
            available(2, "B", &[1]),
            available(3, "C", &[]),
        ]);

        assert_eq!(index.total_titles(), 3);
        assert_eq!(index.provider_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            index.covered_by(1).unwrap(),
            &BTreeSet::from([key(1), key(2)])
        );
        assert_eq!(index.covered_by(2).unwrap(), &BTreeSet::from([key(1)]));
        assert_eq!(index.uncovered(), &[key(3)]);
        assert_eq!(index.uncovered_titles()[0].display_name, "C");
    }

    #[test]
    fn test_rent_and_buy_do_not_cover() {
        let title = Title::new(7, MediaType::Tv, "Rent Only");
        let offers = OfferSet::new(vec![
            ProviderOffer {
                provider_id: 2,
                kind: OfferKind::Rent,
                provider_name: None,
                logo_path: None,
            },
            ProviderOffer {
                provider_id: 3,
                kind: OfferKind::Buy,
                provider_name: None,
                logo_path: None,
            },
        ]);

        let index = CoverageIndex::build(&[TitleAvailability::available(title, offers)]);

        assert_eq!(index.provider_count(), 0);
        assert_eq!(index.uncovered(), &[TitleKey::new(7, MediaType::Tv)]);
    }

    #[test]
    fn test_failed_fetch_is_uncovered() {
        let failed = TitleAvailability::failed(
            Title::new(2, MediaType::Movie, "B"),
            FetchFailure {
                kind: CatalogErrorKind::Transient,
                message: "timed out".to_string(),
            },
        );

        let index = CoverageIndex::build(&[available(1, "A", &[8]), failed]);
        assert_eq!(index.uncovered(), &[key(2)]);
        assert_eq!(index.covered_by(8).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_provider_ids_are_indexed() {
        let index = CoverageIndex::build(&[available(1, "A", &[987_654])]);
        assert!(index.covered_by(987_654).is_some());
    }

    #[test]
    fn test_provider_order_does_not_matter() {
        let forward =
            CoverageIndex::build(&[available(1, "A", &[1, 2, 3]), available(2, "B", &[3])]);
        let reversed =
            CoverageIndex::build(&[available(1, "A", &[3, 2, 1]), available(2, "B", &[3])]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_duplicate_titles_merge() {
        let index = CoverageIndex::build(&[available(1, "A", &[1]), available(1, "A", &[2])]);
        assert_eq!(index.total_titles(), 1);
        assert_eq!(index.provider_count(), 2);
        assert!(index.uncovered().is_empty());
    }

    #[test]
    fn test_same_id_different_media_type_are_distinct() {
        let movie = available(5, "Movie", &[1]);
        let show = TitleAvailability::available(
            Title::new(5, MediaType::Tv, "Show"),
            OfferSet::default(),
        );

        let index = CoverageIndex::build(&[movie, show]);
        assert_eq!(index.total_titles(), 2);
        assert_eq!(index.uncovered(), &[TitleKey::new(5, MediaType::Tv)]);
    }

    #[test]
    fn test_empty_input() {
        let index = CoverageIndex::build(&[]);
        assert_eq!(index.total_titles(), 0);
        assert!(index.uncovered().is_empty());
        assert_eq!(index.provider_count(), 0);
    }

    #[test]
    fn test_mask_for_provider() {
        let index = CoverageIndex::build(&[
            available(1, "A", &[1]),
            available(2, "B", &[2]),
            available(3, "C", &[1]),
        ]);

        let mask = index.mask_for(1);
        assert_eq!(mask.count(), 2);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(2));

        let names: Vec<&str> = index
            .titles_in(&mask)
            .map(|t| t.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_title_mask_across_word_boundary() {
        let mut a = TitleMask::empty(130);
        a.insert(0);
        a.insert(64);
        a.insert(129);

        let mut b = TitleMask::empty(130);
        b.insert(64);
        b.insert(100);

        assert_eq!(a.count_new(&b), 2);
        a.union_with(&b);
        assert_eq!(a.count(), 4);
        assert_eq!(a.positions().collect::<Vec<_>>(), vec![0, 64, 100, 129]);
    }
}
