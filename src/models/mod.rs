use serde::Deserialize;
use std::collections::HashMap;

pub mod availability;
pub mod catalog;
pub mod report;
pub mod streaming_service;
pub mod title;

pub use availability::{
    CatalogErrorKind, FetchFailure, FetchReport, OfferKind, OfferSet, ProviderOffer,
    TitleAvailability,
};
pub use catalog::{
    CastMember, Credit, Episode, Person, PersonId, RegionProvider, SearchHit, SearchKind,
    SearchPage, ShowSchedule, TitleDetails,
};
pub use report::{ObservedProvider, RankedBundle, Report, SearchStrategy};
pub use streaming_service::{ProviderId, ProviderMeta};
pub use title::{MediaType, NewWatchlistEntry, Title, TitleId, TitleKey, WatchlistEntry};

// ============================================================================
// TMDB API Types
// ============================================================================

/// Raw response from GET /{media_type}/{id}/watch/providers
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbWatchProviders {
    #[serde(default)]
    pub id: Option<i64>,
    /// Keyed by ISO 3166-1 region code
    #[serde(default)]
    pub results: HashMap<String, TmdbRegionOffers>,
}

/// Offer groups for a single region
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbRegionOffers {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub free: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub ads: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub rent: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub buy: Vec<TmdbProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProviderEntry {
    pub provider_id: i64,
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub display_priority: Option<i64>,
}

/// Raw response from GET /watch/providers/{media_type}?watch_region=
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProviderList {
    #[serde(default)]
    pub results: Vec<TmdbProviderEntry>,
}

/// Raw response from GET /search/{multi,movie,tv}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub results: Vec<TmdbSearchItem>,
}

/// Search result; movies carry `title`, shows carry `name`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchItem {
    pub id: i64,
    /// Only set by multi search ("movie", "tv" or "person")
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

/// Raw response from GET /{media_type}/{id} with
/// `append_to_response=watch/providers,credits,external_ids`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTitleDetails {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub number_of_seasons: Option<u32>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub external_ids: Option<TmdbExternalIds>,
    #[serde(default, rename = "watch/providers")]
    pub watch_providers: Option<TmdbWatchProviders>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbExternalIds {
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// Raw response from GET /person/{id}?append_to_response=combined_credits
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPerson {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub known_for_department: Option<String>,
    #[serde(default)]
    pub combined_credits: Option<TmdbCombinedCredits>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCombinedCredits {
    #[serde(default)]
    pub cast: Vec<TmdbPersonCredit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPersonCredit {
    pub id: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
}

/// Raw response from GET /tv/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbShow {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub next_episode_to_air: Option<TmdbEpisode>,
    #[serde(default)]
    pub seasons: Vec<TmdbSeasonSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSeasonSummary {
    #[serde(default)]
    pub season_number: u32,
}

/// Raw response from GET /tv/{id}/season/{n}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSeason {
    #[serde(default)]
    pub episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbEpisode {
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    /// "YYYY-MM-DD", empty or null when unannounced
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub still_path: Option<String>,
}
