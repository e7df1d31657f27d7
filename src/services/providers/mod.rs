/// Catalog source abstraction
///
/// A catalog source answers one question: which providers offer a title in a
/// region, and how (subscription, rent, buy...). The optimizer only depends on
/// this trait, so the TMDB implementation can be swapped for another data
/// source or a test double. Browsing (search, details, people, episodes) sits
/// behind the separate [`TitleCatalog`] trait.
use std::time::Duration;

use thiserror::Error;

use crate::{
    error::AppError,
    models::{
        CatalogErrorKind, Episode, MediaType, OfferSet, Person, PersonId, RegionProvider,
        SearchKind, SearchPage, ShowSchedule, TitleDetails, TitleId, TitleKey,
    },
};

pub mod tmdb;

pub use tmdb::TmdbCatalog;

/// Errors a catalog source can report for a single title
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Title {0} not found in catalog")]
    NotFound(TitleKey),

    /// A person, season or other non-title lookup came back empty
    #[error("{0} not found in catalog")]
    ResourceNotFound(String),

    #[error("Catalog rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Catalog request failed: {0}")]
    Transient(String),

    #[error("Catalog request timed out after {0:?}")]
    Timeout(Duration),
}

impl CatalogError {
    /// Coarse classification, kept so a retry policy can target transient kinds
    pub fn kind(&self) -> CatalogErrorKind {
        match self {
            CatalogError::NotFound(_) | CatalogError::ResourceNotFound(_) => {
                CatalogErrorKind::NotFound
            }
            CatalogError::Unauthorized(_) => CatalogErrorKind::Unauthorized,
            CatalogError::Transient(_) | CatalogError::Timeout(_) => CatalogErrorKind::Transient,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Transient(format!("request timed out: {}", e))
        } else {
            CatalogError::Transient(e.to_string())
        }
    }
}

impl From<AppError> for CatalogError {
    fn from(e: AppError) -> Self {
        CatalogError::Transient(e.to_string())
    }
}

/// Direct lookups from a handler: a missing resource is a 404, anything
/// else means the catalog let us down
impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e.kind() {
            CatalogErrorKind::NotFound => AppError::NotFound(e.to_string()),
            CatalogErrorKind::Unauthorized | CatalogErrorKind::Transient => {
                AppError::CatalogUnavailable(e.to_string())
            }
        }
    }
}

/// Trait for streaming catalog sources
///
/// Implementations must be safe to call concurrently; the availability
/// fetcher issues several lookups at once against the same instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every offer for `title` in `region` (ISO 3166-1, e.g. "EG")
    ///
    /// A title the catalog knows but that has no offers in the region is an
    /// empty `OfferSet`, not an error.
    async fn fetch_offers(&self, title: &TitleKey, region: &str) -> Result<OfferSet, CatalogError>;

    /// Catalog name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Title metadata used by the browsing endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TitleCatalog: Send + Sync {
    /// One page of movies and shows matching `query`; never returns people
    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        page: u32,
    ) -> Result<SearchPage, CatalogError>;

    /// Full details with cast and the offers in `region`
    async fn details(&self, title: &TitleKey, region: &str) -> Result<TitleDetails, CatalogError>;

    /// Biography and combined acting credits
    async fn person(&self, id: PersonId) -> Result<Person, CatalogError>;

    async fn show_schedule(&self, id: TitleId) -> Result<ShowSchedule, CatalogError>;

    async fn season(
        &self,
        show_id: TitleId,
        season_number: u32,
    ) -> Result<Vec<Episode>, CatalogError>;

    /// Every provider the catalog knows in `region` for `media_type`
    async fn region_providers(
        &self,
        media_type: MediaType,
        region: &str,
    ) -> Result<Vec<RegionProvider>, CatalogError>;
}
