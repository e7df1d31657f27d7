use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// TMDB numeric identifier for a movie or TV show
pub type TitleId = i64;

/// Type of content, matching TMDB's `media_type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(AppError::InvalidInput(format!(
                "Invalid media type: {}",
                other
            ))),
        }
    }
}

/// Identity of a title. TMDB reuses numeric ids across movies and shows,
/// so the media type is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TitleKey {
    pub id: TitleId,
    pub media_type: MediaType,
}

impl TitleKey {
    pub fn new(id: TitleId, media_type: MediaType) -> Self {
        Self { id, media_type }
    }
}

impl Display for TitleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.media_type, self.id)
    }
}

/// A watchlist title as seen by the optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub media_type: MediaType,
    #[serde(rename = "title")]
    pub display_name: String,
}

impl Title {
    pub fn new(id: TitleId, media_type: MediaType, display_name: impl Into<String>) -> Self {
        Self {
            id,
            media_type,
            display_name: display_name.into(),
        }
    }

    pub fn key(&self) -> TitleKey {
        TitleKey::new(self.id, self.media_type)
    }
}

/// A stored watchlist row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub id: TitleId,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub release_date: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl From<&WatchlistEntry> for Title {
    fn from(entry: &WatchlistEntry) -> Self {
        Title::new(entry.id, entry.media_type, entry.title.clone())
    }
}

/// Body of `POST /api/watchlist`
#[derive(Debug, Clone, Deserialize)]
pub struct NewWatchlistEntry {
    pub id: TitleId,
    pub media_type: MediaType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl NewWatchlistEntry {
    pub fn into_entry(self, added_at: DateTime<Utc>) -> WatchlistEntry {
        WatchlistEntry {
            id: self.id,
            media_type: self.media_type,
            title: self.title,
            poster_path: self.poster_path,
            vote_average: self.vote_average,
            release_date: self.release_date,
            added_at,
        }
    }
}
