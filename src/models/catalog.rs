use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, str::FromStr};

use super::{MediaType, OfferSet, ProviderId, Title, TitleId};
use crate::error::AppError;

/// TMDB person identifier
pub type PersonId = i64;

/// Which TMDB search endpoint to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchKind {
    /// Movies and shows together; people are dropped
    #[default]
    Multi,
    Movie,
    Tv,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Multi => "multi",
            SearchKind::Movie => "movie",
            SearchKind::Tv => "tv",
        }
    }
}

impl FromStr for SearchKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multi" => Ok(SearchKind::Multi),
            "movie" => Ok(SearchKind::Movie),
            "tv" => Ok(SearchKind::Tv),
            other => Err(AppError::InvalidInput(format!(
                "Invalid search type: {}",
                other
            ))),
        }
    }
}

/// A movie or show matching a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: TitleId,
    pub media_type: MediaType,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    /// Release date for movies, first air date for shows
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            page: 1,
            total_pages: 0,
            total_results: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: PersonId,
    pub name: String,
    pub character: String,
    pub profile_path: Option<String>,
}

/// Everything the detail page shows for one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleDetails {
    pub id: TitleId,
    pub media_type: MediaType,
    pub title: String,
    pub overview: String,
    pub tagline: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f64,
    pub release_date: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub number_of_seasons: Option<u32>,
    pub imdb_id: Option<String>,
    /// Billing order, truncated
    pub cast: Vec<CastMember>,
    /// Offers in the requested region
    pub offers: OfferSet,
}

/// One acting credit from a person's combined filmography
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: TitleId,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub release_date: Option<String>,
    pub character: String,
}

impl Credit {
    pub fn to_title(&self) -> Title {
        Title::new(self.id, self.media_type, self.title.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub biography: String,
    pub profile_path: Option<String>,
    pub birthday: Option<String>,
    pub place_of_birth: Option<String>,
    pub known_for_department: Option<String>,
    pub credits: Vec<Credit>,
}

/// Airing state of a show, enough to find its upcoming episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowSchedule {
    pub id: TitleId,
    pub name: String,
    pub poster_path: Option<String>,
    pub status: String,
    pub next_episode_season: Option<u32>,
    /// Regular seasons only (season 0 holds specials), in listing order
    pub season_numbers: Vec<u32>,
}

impl ShowSchedule {
    /// Ended and canceled shows have nothing left to air
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "Ended" | "Canceled")
    }

    /// The season of the next announced episode plus the last two seasons,
    /// ascending
    pub fn seasons_to_check(&self) -> Vec<u32> {
        let mut seasons: BTreeSet<u32> = self.next_episode_season.into_iter().collect();
        let skip = self.season_numbers.len().saturating_sub(2);
        seasons.extend(self.season_numbers.iter().skip(skip).copied());
        seasons.into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub season_number: u32,
    pub episode_number: u32,
    pub name: String,
    pub overview: String,
    /// `None` when the catalog has no (parseable) date yet
    pub air_date: Option<NaiveDate>,
    pub still_path: Option<String>,
}

/// A provider the catalog lists for a region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionProvider {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub logo_path: Option<String>,
}
