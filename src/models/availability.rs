use serde::{Deserialize, Serialize};

use super::{ProviderId, Title};

/// How a provider makes a title available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    /// Included in a subscription. The only kind that counts as coverage.
    Flatrate,
    Free,
    Ads,
    Rent,
    Buy,
}

/// One provider offering one title in the requested region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOffer {
    pub provider_id: ProviderId,
    pub kind: OfferKind,
    /// Label reported by the catalog, used when the provider has no metadata entry
    pub provider_name: Option<String>,
    pub logo_path: Option<String>,
}

impl ProviderOffer {
    pub fn flatrate(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            kind: OfferKind::Flatrate,
            provider_name: None,
            logo_path: None,
        }
    }

    pub fn is_flatrate(&self) -> bool {
        self.kind == OfferKind::Flatrate
    }
}

/// All offers the catalog returned for a single title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSet {
    pub offers: Vec<ProviderOffer>,
}

impl OfferSet {
    pub fn new(offers: Vec<ProviderOffer>) -> Self {
        Self { offers }
    }

    pub fn flatrate(&self) -> impl Iterator<Item = &ProviderOffer> {
        self.offers.iter().filter(|o| o.is_flatrate())
    }
}

/// Classification of a catalog failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogErrorKind {
    NotFound,
    Unauthorized,
    /// Network errors, timeouts, 5xx and undecodable responses
    Transient,
}

/// Why a title's availability could not be checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub kind: CatalogErrorKind,
    pub message: String,
}

/// Fetch outcome for one watchlist title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleAvailability {
    pub title: Title,
    pub offers: OfferSet,
    pub unavailable: bool,
    pub failure: Option<FetchFailure>,
}

impl TitleAvailability {
    pub fn available(title: Title, offers: OfferSet) -> Self {
        Self {
            title,
            offers,
            unavailable: false,
            failure: None,
        }
    }

    /// A failed fetch is indexed as a title with zero offers
    pub fn failed(title: Title, failure: FetchFailure) -> Self {
        Self {
            title,
            offers: OfferSet::default(),
            unavailable: true,
            failure: Some(failure),
        }
    }
}

/// Per-title results in watchlist order plus the failure tally
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub results: Vec<TitleAvailability>,
    pub failed_count: usize,
}
