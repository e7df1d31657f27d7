use std::sync::Arc;

use chrono::{Days, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::{
    models::{MediaType, Title, TitleId},
    services::providers::TitleCatalog,
};

/// Look-ahead window of the episode calendar
pub const DEFAULT_CALENDAR_DAYS: u64 = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingEpisode {
    pub show_id: TitleId,
    pub show_name: String,
    pub show_poster: Option<String>,
    pub season_number: u32,
    pub episode_number: u32,
    pub name: String,
    pub overview: String,
    pub air_date: NaiveDate,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarReport {
    /// Ascending by air date
    pub episodes: Vec<UpcomingEpisode>,
    /// TV shows on the watchlist, finished ones included
    pub shows: usize,
    pub days: u64,
}

/// Upcoming episodes for the shows on a watchlist
///
/// Shows are looked up concurrently, bounded like availability fetches. A
/// show whose schedule or seasons cannot be loaded simply contributes no
/// episodes.
#[derive(Clone)]
pub struct EpisodeCalendar {
    catalog: Arc<dyn TitleCatalog>,
    concurrency: usize,
    days: u64,
}

impl EpisodeCalendar {
    pub fn new(catalog: Arc<dyn TitleCatalog>, concurrency: usize, days: u64) -> Self {
        Self {
            catalog,
            concurrency: concurrency.max(1),
            days,
        }
    }

    /// Episodes airing between `today` and `today + days`, both inclusive
    pub async fn upcoming(&self, watchlist: &[Title], today: NaiveDate) -> CalendarReport {
        let shows: Vec<&Title> = watchlist
            .iter()
            .filter(|t| t.media_type == MediaType::Tv)
            .collect();
        let cutoff = today
            .checked_add_days(Days::new(self.days))
            .unwrap_or(NaiveDate::MAX);

        let per_show: Vec<Vec<UpcomingEpisode>> = stream::iter(
            shows
                .iter()
                .map(|show| self.show_episodes(show, today, cutoff))
                .collect::<Vec<_>>(),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut episodes: Vec<UpcomingEpisode> = per_show.into_iter().flatten().collect();
        // Stable, so same-day episodes keep watchlist then season order
        episodes.sort_by_key(|e| e.air_date);

        tracing::info!(
            shows = shows.len(),
            episodes = episodes.len(),
            days = self.days,
            "Episode calendar built"
        );

        CalendarReport {
            episodes,
            shows: shows.len(),
            days: self.days,
        }
    }

    async fn show_episodes(
        &self,
        show: &Title,
        today: NaiveDate,
        cutoff: NaiveDate,
    ) -> Vec<UpcomingEpisode> {
        let schedule = match self.catalog.show_schedule(show.id).await {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(show_id = show.id, error = %e, "Cannot load show schedule");
                return Vec::new();
            }
        };

        if schedule.is_finished() {
            tracing::debug!(show_id = show.id, status = %schedule.status, "Skipping finished show");
            return Vec::new();
        }

        let show_name = if schedule.name.is_empty() {
            show.display_name.clone()
        } else {
            schedule.name.clone()
        };

        let mut upcoming = Vec::new();
        for season in schedule.seasons_to_check() {
            let episodes = match self.catalog.season(show.id, season).await {
                Ok(episodes) => episodes,
                Err(e) => {
                    tracing::warn!(show_id = show.id, season, error = %e, "Cannot load season");
                    continue;
                }
            };

            upcoming.extend(episodes.into_iter().filter_map(|ep| {
                let air_date = ep.air_date.filter(|d| (today..=cutoff).contains(d))?;
                Some(UpcomingEpisode {
                    show_id: show.id,
                    show_name: show_name.clone(),
                    show_poster: schedule.poster_path.clone(),
                    season_number: ep.season_number,
                    episode_number: ep.episode_number,
                    name: ep.name,
                    overview: ep.overview,
                    air_date,
                    still_path: ep.still_path,
                })
            }));
        }

        upcoming
    }
}
