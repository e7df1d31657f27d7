/// TMDB catalog
///
/// TMDB aggregates JustWatch data per region. One call per title:
/// `GET /{media_type}/{id}/watch/providers` returns offer groups
/// (`flatrate`, `free`, `ads`, `rent`, `buy`) keyed by region code.
/// The same client serves search, details, people and episode lookups.
use chrono::NaiveDate;
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    cached,
    db::{Cache, CacheKey},
    models::{
        CastMember, Credit, Episode, MediaType, OfferKind, OfferSet, Person, PersonId,
        ProviderOffer, RegionProvider, SearchHit, SearchKind, SearchPage, ShowSchedule,
        TitleDetails, TitleId, TitleKey, TmdbEpisode, TmdbPerson, TmdbProviderList,
        TmdbRegionOffers, TmdbSearchPage, TmdbSeason, TmdbShow, TmdbTitleDetails,
        TmdbWatchProviders,
    },
    services::providers::{CatalogError, CatalogSource, TitleCatalog},
};

/// Cast members kept on a details response
const DETAILS_CAST_LIMIT: usize = 20;

#[derive(Clone)]
pub struct TmdbCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
    cache_ttl: u64,
}

impl TmdbCatalog {
    pub fn new(cache: Cache, api_key: String, api_url: String, cache_ttl: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
            cache_ttl,
        }
    }

    /// GET `{api_url}{path}` with the API key attached. 404 becomes
    /// `ResourceNotFound(path)`; callers that know the title narrow it.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let response = self
            .http_client
            .get(format!("{}{}", self.api_url, path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::ResourceNotFound(path.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Unauthorized(
                "Invalid TMDB API key. Check TMDB_API_KEY".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = %path, status = %status, body = %body, "TMDB request failed");
            return Err(CatalogError::Transient(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn call_api(&self, title: &TitleKey, region: &str) -> Result<OfferSet, CatalogError> {
        tracing::debug!(title = %title, region = %region, "Fetching watch providers from TMDB");

        let path = format!("/{}/{}/watch/providers", title.media_type, title.id);
        let mut payload: TmdbWatchProviders = self
            .get_json(&path, &[])
            .await
            .map_err(|e| narrow_not_found(e, title))?;
        let offers = convert_region_offers(payload.results.remove(region));

        tracing::debug!(
            title = %title,
            region = %region,
            offers = offers.offers.len(),
            "Watch providers fetched"
        );

        Ok(offers)
    }

    async fn fetch_region_providers(
        &self,
        media_type: MediaType,
        region: &str,
    ) -> Result<Vec<RegionProvider>, CatalogError> {
        let path = format!("/watch/providers/{}", media_type);
        let payload: TmdbProviderList = self.get_json(&path, &[("watch_region", region)]).await?;

        Ok(payload
            .results
            .into_iter()
            .map(|entry| RegionProvider {
                provider_id: entry.provider_id,
                provider_name: entry.provider_name,
                logo_path: entry.logo_path,
            })
            .collect())
    }
}

fn narrow_not_found(e: CatalogError, title: &TitleKey) -> CatalogError {
    match e {
        CatalogError::ResourceNotFound(_) => CatalogError::NotFound(*title),
        other => other,
    }
}

/// Flattens TMDB's offer groups for one region. A missing region means the
/// title is not offered there at all.
fn convert_region_offers(region_offers: Option<TmdbRegionOffers>) -> OfferSet {
    let Some(groups) = region_offers else {
        return OfferSet::default();
    };

    let mut offers = Vec::new();
    for (kind, entries) in [
        (OfferKind::Flatrate, groups.flatrate),
        (OfferKind::Free, groups.free),
        (OfferKind::Ads, groups.ads),
        (OfferKind::Rent, groups.rent),
        (OfferKind::Buy, groups.buy),
    ] {
        offers.extend(entries.into_iter().map(|entry| ProviderOffer {
            provider_id: entry.provider_id,
            kind,
            provider_name: Some(entry.provider_name),
            logo_path: entry.logo_path,
        }));
    }

    OfferSet::new(offers)
}

/// Multi search also returns people; those have no media type we can use
fn convert_search_page(kind: SearchKind, raw: TmdbSearchPage) -> SearchPage {
    let results = raw
        .results
        .into_iter()
        .filter_map(|item| {
            let media_type = match kind {
                SearchKind::Movie => MediaType::Movie,
                SearchKind::Tv => MediaType::Tv,
                SearchKind::Multi => item.media_type.as_deref()?.parse::<MediaType>().ok()?,
            };
            Some(SearchHit {
                id: item.id,
                media_type,
                title: item.title.or(item.name).unwrap_or_default(),
                overview: item.overview.unwrap_or_default(),
                poster_path: item.poster_path,
                vote_average: item.vote_average,
                release_date: non_empty(item.release_date.or(item.first_air_date)),
            })
        })
        .collect();

    SearchPage {
        results,
        page: raw.page.max(1),
        total_pages: raw.total_pages,
        total_results: raw.total_results,
    }
}

fn convert_details(media_type: MediaType, raw: TmdbTitleDetails, region: &str) -> TitleDetails {
    let offers = convert_region_offers(
        raw.watch_providers
            .and_then(|mut providers| providers.results.remove(region)),
    );

    let cast = raw
        .credits
        .map(|credits| credits.cast)
        .unwrap_or_default()
        .into_iter()
        .take(DETAILS_CAST_LIMIT)
        .map(|member| CastMember {
            id: member.id,
            name: member.name,
            character: member.character.unwrap_or_default(),
            profile_path: member.profile_path,
        })
        .collect();

    TitleDetails {
        id: raw.id,
        media_type,
        title: raw.title.or(raw.name).unwrap_or_default(),
        overview: raw.overview.unwrap_or_default(),
        tagline: non_empty(raw.tagline),
        poster_path: raw.poster_path,
        backdrop_path: raw.backdrop_path,
        vote_average: raw.vote_average,
        release_date: non_empty(raw.release_date.or(raw.first_air_date)),
        runtime_minutes: raw
            .runtime
            .or_else(|| raw.episode_run_time.first().copied()),
        status: raw.status,
        genres: raw.genres.into_iter().map(|g| g.name).collect(),
        number_of_seasons: raw.number_of_seasons,
        imdb_id: raw.external_ids.and_then(|ids| non_empty(ids.imdb_id)),
        cast,
        offers,
    }
}

fn convert_person(raw: TmdbPerson) -> Person {
    let credits = raw
        .combined_credits
        .map(|c| c.cast)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|credit| {
            let media_type = credit
                .media_type
                .as_deref()
                .unwrap_or("movie")
                .parse::<MediaType>()
                .ok()?;
            Some(Credit {
                id: credit.id,
                media_type,
                title: credit.title.or(credit.name).unwrap_or_default(),
                poster_path: credit.poster_path,
                vote_average: credit.vote_average,
                vote_count: credit.vote_count,
                release_date: non_empty(credit.release_date.or(credit.first_air_date)),
                character: credit.character.unwrap_or_default(),
            })
        })
        .collect();

    Person {
        id: raw.id,
        name: raw.name,
        biography: raw.biography.unwrap_or_default(),
        profile_path: raw.profile_path,
        birthday: raw.birthday,
        place_of_birth: raw.place_of_birth,
        known_for_department: raw.known_for_department,
        credits,
    }
}

fn convert_show(raw: TmdbShow) -> ShowSchedule {
    ShowSchedule {
        id: raw.id,
        name: raw.name.unwrap_or_default(),
        poster_path: raw.poster_path,
        status: raw.status.unwrap_or_default(),
        next_episode_season: raw
            .next_episode_to_air
            .and_then(|ep| ep.season_number)
            .filter(|&n| n > 0),
        season_numbers: raw
            .seasons
            .into_iter()
            .map(|s| s.season_number)
            .filter(|&n| n > 0)
            .collect(),
    }
}

fn convert_episode(season_number: u32, raw: TmdbEpisode) -> Episode {
    Episode {
        season_number: raw.season_number.unwrap_or(season_number),
        episode_number: raw.episode_number,
        name: raw.name.unwrap_or_default(),
        overview: raw.overview.unwrap_or_default(),
        air_date: raw
            .air_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        still_path: raw.still_path,
    }
}

/// TMDB sends "" for unknown dates and taglines
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait::async_trait]
impl CatalogSource for TmdbCatalog {
    async fn fetch_offers(&self, title: &TitleKey, region: &str) -> Result<OfferSet, CatalogError> {
        let region = region.to_uppercase();
        let key = CacheKey::Availability {
            region: region.clone(),
            title: *title,
        };

        cached!(self.cache, key, self.cache_ttl, async {
            self.call_api(title, &region).await
        })
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[async_trait::async_trait]
impl TitleCatalog for TmdbCatalog {
    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        page: u32,
    ) -> Result<SearchPage, CatalogError> {
        let path = format!("/search/{}", kind.as_str());
        let page = page.max(1).to_string();
        let params = [
            ("query", query),
            ("page", page.as_str()),
            ("include_adult", "false"),
        ];

        let raw: TmdbSearchPage = self.get_json(&path, &params).await?;
        Ok(convert_search_page(kind, raw))
    }

    async fn details(&self, title: &TitleKey, region: &str) -> Result<TitleDetails, CatalogError> {
        let path = format!("/{}/{}", title.media_type, title.id);
        let raw: TmdbTitleDetails = self
            .get_json(
                &path,
                &[("append_to_response", "watch/providers,credits,external_ids")],
            )
            .await
            .map_err(|e| narrow_not_found(e, title))?;

        Ok(convert_details(title.media_type, raw, &region.to_uppercase()))
    }

    async fn person(&self, id: PersonId) -> Result<Person, CatalogError> {
        let path = format!("/person/{}", id);
        let raw: TmdbPerson = self
            .get_json(&path, &[("append_to_response", "combined_credits")])
            .await?;
        Ok(convert_person(raw))
    }

    async fn show_schedule(&self, id: TitleId) -> Result<ShowSchedule, CatalogError> {
        let raw: TmdbShow = self.get_json(&format!("/tv/{}", id), &[]).await?;
        Ok(convert_show(raw))
    }

    async fn season(
        &self,
        show_id: TitleId,
        season_number: u32,
    ) -> Result<Vec<Episode>, CatalogError> {
        let path = format!("/tv/{}/season/{}", show_id, season_number);
        let raw: TmdbSeason = self.get_json(&path, &[]).await?;

        Ok(raw
            .episodes
            .into_iter()
            .map(|ep| convert_episode(season_number, ep))
            .collect())
    }

    async fn region_providers(
        &self,
        media_type: MediaType,
        region: &str,
    ) -> Result<Vec<RegionProvider>, CatalogError> {
        let region = region.to_uppercase();
        let key = CacheKey::RegionProviders {
            region: region.clone(),
            media_type,
        };

        cached!(self.cache, key, self.cache_ttl, async {
            self.fetch_region_providers(media_type, &region).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::models::TmdbProviderEntry;
    use axum::{extract::Query, http::StatusCode as HttpStatus, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    fn entry(id: i64, name: &str) -> TmdbProviderEntry {
        TmdbProviderEntry {
            provider_id: id,
            provider_name: name.to_string(),
            logo_path: Some(format!("/{}.jpg", id)),
            display_priority: None,
        }
    }

    /// Redis that accepts connections and never answers, so every cache
    /// read runs into its timeout
    async fn unresponsive_redis_cache() -> Cache {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = create_redis_client(&format!("redis://{}", addr)).unwrap();
        let (cache, _handle) = Cache::new(client, Duration::from_millis(50));
        cache
    }

    async fn fake_tmdb() -> String {
        let app = Router::new()
            .route(
                "/movie/603/watch/providers",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("api_key").map(String::as_str) != Some("test-key") {
                        return (HttpStatus::UNAUTHORIZED, Json(json!({})));
                    }
                    let body = json!({
                        "id": 603,
                        "results": {"EG": {
                            "flatrate": [{"provider_id": 8, "provider_name": "Netflix"}],
                            "buy": [{"provider_id": 3, "provider_name": "Google Play"}]
                        }}
                    });
                    (HttpStatus::OK, Json(body))
                }),
            )
            .route(
                "/movie/500/watch/providers",
                get(|| async { (HttpStatus::SERVICE_UNAVAILABLE, "upstream busy") }),
            )
            .route(
                "/search/multi",
                get(|| async {
                    Json(json!({
                        "page": 1, "total_pages": 1, "total_results": 3,
                        "results": [
                            {"id": 603, "media_type": "movie", "title": "The Matrix",
                             "release_date": "1999-03-30", "vote_average": 8.2},
                            {"id": 6384, "media_type": "person", "name": "Keanu Reeves"},
                            {"id": 1396, "media_type": "tv", "name": "Breaking Bad",
                             "first_air_date": "2008-01-20"}
                        ]
                    }))
                }),
            )
            .route(
                "/tv/1396",
                get(|| async {
                    Json(json!({
                        "id": 1396,
                        "name": "Breaking Bad",
                        "status": "Returning Series",
                        "tagline": "",
                        "episode_run_time": [47],
                        "genres": [{"id": 18, "name": "Drama"}],
                        "next_episode_to_air": {"season_number": 6, "episode_number": 1},
                        "seasons": [
                            {"season_number": 0}, {"season_number": 4},
                            {"season_number": 5}, {"season_number": 6}
                        ],
                        "credits": {"cast": [{"id": 17419, "name": "Bryan Cranston"}]},
                        "external_ids": {"imdb_id": "tt0903747"},
                        "watch/providers": {"results": {
                            "EG": {"flatrate": [{"provider_id": 8, "provider_name": "Netflix"}]}
                        }}
                    }))
                }),
            )
            .route(
                "/tv/1396/season/6",
                get(|| async {
                    Json(json!({"episodes": [
                        {"episode_number": 1, "name": "Pilot", "air_date": "2030-01-05"},
                        {"episode_number": 2, "air_date": ""}
                    ]}))
                }),
            )
            .route(
                "/person/17419",
                get(|| async {
                    Json(json!({
                        "id": 17419,
                        "name": "Bryan Cranston",
                        "biography": null,
                        "combined_credits": {"cast": [
                            {"id": 1396, "media_type": "tv", "name": "Breaking Bad",
                             "vote_count": 900, "character": "Walter White"},
                            {"id": 2, "media_type": "movie", "title": "Drive", "vote_count": 50}
                        ]}
                    }))
                }),
            )
            .route(
                "/watch/providers/movie",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let results = if q.get("watch_region").map(String::as_str) == Some("EG") {
                        json!([{
                            "provider_id": 8, "provider_name": "Netflix", "logo_path": "/n.jpg"
                        }])
                    } else {
                        json!([])
                    };
                    Json(json!({ "results": results }))
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn catalog(api_key: &str) -> TmdbCatalog {
        TmdbCatalog::new(
            unresponsive_redis_cache().await,
            api_key.to_string(),
            fake_tmdb().await,
            60,
        )
    }

    #[tokio::test]
    async fn test_stalled_cache_still_yields_offers() {
        let catalog = catalog("test-key").await;
        let key = TitleKey::new(603, MediaType::Movie);

        let offers = assert_ok!(catalog.fetch_offers(&key, "eg").await);

        let flatrate: Vec<i64> = offers.flatrate().map(|o| o.provider_id).collect();
        assert_eq!(flatrate, vec![8]);
        assert_eq!(offers.offers.len(), 2);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let catalog = catalog("test-key").await;

        let missing = TitleKey::new(404, MediaType::Movie);
        let err = assert_err!(catalog.fetch_offers(&missing, "EG").await);
        assert!(matches!(err, CatalogError::NotFound(key) if key == missing));

        let busy = TitleKey::new(500, MediaType::Movie);
        let err = assert_err!(catalog.fetch_offers(&busy, "EG").await);
        assert!(matches!(err, CatalogError::Transient(_)));

        let err = assert_err!(catalog.person(1).await);
        assert!(matches!(err, CatalogError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_api_key_is_unauthorized() {
        let catalog = catalog("wrong").await;
        let key = TitleKey::new(603, MediaType::Movie);

        let err = assert_err!(catalog.fetch_offers(&key, "EG").await);
        assert!(matches!(err, CatalogError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_multi_search_drops_people() {
        let catalog = catalog("test-key").await;
        let page = assert_ok!(catalog.search("matrix", SearchKind::Multi, 1).await);

        let hits: Vec<(i64, MediaType)> =
            page.results.iter().map(|h| (h.id, h.media_type)).collect();
        assert_eq!(hits, vec![(603, MediaType::Movie), (1396, MediaType::Tv)]);
        assert_eq!(page.results[1].title, "Breaking Bad");
        assert_eq!(page.results[1].release_date.as_deref(), Some("2008-01-20"));
        assert_eq!(page.total_results, 3);
    }

    #[tokio::test]
    async fn test_details_for_region() {
        let catalog = catalog("test-key").await;
        let key = TitleKey::new(1396, MediaType::Tv);

        let details = assert_ok!(catalog.details(&key, "eg").await);
        assert_eq!(details.title, "Breaking Bad");
        assert_eq!(details.tagline, None);
        assert_eq!(details.runtime_minutes, Some(47));
        assert_eq!(details.genres, vec!["Drama"]);
        assert_eq!(details.imdb_id.as_deref(), Some("tt0903747"));
        assert_eq!(details.cast[0].name, "Bryan Cranston");
        assert_eq!(details.offers.flatrate().count(), 1);

        let elsewhere = assert_ok!(catalog.details(&key, "DE").await);
        assert!(elsewhere.offers.offers.is_empty());
    }

    #[tokio::test]
    async fn test_show_schedule_and_season() {
        let catalog = catalog("test-key").await;

        let show = assert_ok!(catalog.show_schedule(1396).await);
        assert_eq!(show.season_numbers, vec![4, 5, 6]);
        assert_eq!(show.next_episode_season, Some(6));
        assert!(!show.is_finished());

        let episodes = assert_ok!(catalog.season(1396, 6).await);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].season_number, 6);
        assert_eq!(episodes[0].air_date, NaiveDate::from_ymd_opt(2030, 1, 5));
        assert_eq!(episodes[1].air_date, None);
    }

    #[tokio::test]
    async fn test_person_credits() {
        let catalog = catalog("test-key").await;

        let person = assert_ok!(catalog.person(17419).await);
        assert_eq!(person.name, "Bryan Cranston");
        assert_eq!(person.biography, "");
        assert_eq!(person.credits.len(), 2);
        assert_eq!(person.credits[0].media_type, MediaType::Tv);
        assert_eq!(person.credits[0].title, "Breaking Bad");
        assert_eq!(person.credits[1].title, "Drive");
    }

    #[tokio::test]
    async fn test_region_providers() {
        let catalog = catalog("test-key").await;

        let providers = assert_ok!(catalog.region_providers(MediaType::Movie, "eg").await);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider_id, 8);
        assert_eq!(providers[0].logo_path.as_deref(), Some("/n.jpg"));
    }

    #[test]
    fn test_convert_missing_region_is_empty() {
        let offers = convert_region_offers(None);
        assert!(offers.offers.is_empty());
    }

    #[test]
    fn test_convert_keeps_every_group() {
        let groups = TmdbRegionOffers {
            link: None,
            flatrate: vec![entry(8, "Netflix"), entry(337, "Disney Plus")],
            free: vec![entry(300, "Pluto TV")],
            ads: vec![],
            rent: vec![entry(2, "Apple TV")],
            buy: vec![entry(3, "Google Play Movies")],
        };

        let offers = convert_region_offers(Some(groups));
        assert_eq!(offers.offers.len(), 5);

        let flatrate: Vec<i64> = offers.flatrate().map(|o| o.provider_id).collect();
        assert_eq!(flatrate, vec![8, 337]);

        let rent = offers
            .offers
            .iter()
            .find(|o| o.kind == OfferKind::Rent)
            .unwrap();
        assert_eq!(rent.provider_id, 2);
        assert_eq!(rent.provider_name.as_deref(), Some("Apple TV"));
    }

    #[test]
    fn test_typed_search_sets_media_type() {
        let raw: TmdbSearchPage = serde_json::from_value(json!({
            "page": 0,
            "results": [{"id": 1, "name": "Dark", "first_air_date": ""}]
        }))
        .unwrap();

        let page = convert_search_page(SearchKind::Tv, raw);
        assert_eq!(page.page, 1);
        assert_eq!(page.results[0].media_type, MediaType::Tv);
        assert_eq!(page.results[0].release_date, None);
    }
}
