use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::AppResult,
    models::{Credit, MediaType, Person, PersonId, ProviderOffer, TitleId},
    services::{availability::AvailabilityFetcher, providers::TitleCatalog},
};

/// Credits shown on a person page
pub const PROFILE_CREDIT_LIMIT: usize = 30;
/// Credits checked for availability, each one a catalog lookup
pub const AVAILABILITY_CREDIT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub biography: String,
    pub profile_path: Option<String>,
    pub birthday: Option<String>,
    pub place_of_birth: Option<String>,
    pub known_for_department: Option<String>,
}

impl From<&Person> for PersonSummary {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id,
            name: person.name.clone(),
            biography: person.biography.clone(),
            profile_path: person.profile_path.clone(),
            birthday: person.birthday.clone(),
            place_of_birth: person.place_of_birth.clone(),
            known_for_department: person.known_for_department.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonProfile {
    #[serde(flatten)]
    pub person: PersonSummary,
    /// Most voted first
    pub filmography: Vec<Credit>,
}

/// A credit with its offers in the requested region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditAvailability {
    pub id: TitleId,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub release_date: Option<String>,
    pub character: String,
    pub offers: Vec<ProviderOffer>,
    /// Streamable by subscription in the region
    pub available: bool,
    /// The lookup failed, so `available: false` means "unknown"
    pub unchecked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonAvailability {
    pub person: PersonSummary,
    pub region: String,
    pub filmography: Vec<CreditAvailability>,
    pub failed_count: usize,
}

/// Person pages: biography, best-known credits and where to stream them
#[derive(Clone)]
pub struct FilmographyLookup {
    catalog: Arc<dyn TitleCatalog>,
    fetcher: AvailabilityFetcher,
}

impl FilmographyLookup {
    pub fn new(catalog: Arc<dyn TitleCatalog>, fetcher: AvailabilityFetcher) -> Self {
        Self { catalog, fetcher }
    }

    pub async fn profile(&self, id: PersonId) -> AppResult<PersonProfile> {
        let person = self.catalog.person(id).await?;

        Ok(PersonProfile {
            person: PersonSummary::from(&person),
            filmography: top_credits(person.credits, PROFILE_CREDIT_LIMIT),
        })
    }

    /// The person's most voted credits with their offers in `region`,
    /// fetched through the same bounded fetcher the optimizer uses
    pub async fn availability(&self, id: PersonId, region: &str) -> AppResult<PersonAvailability> {
        let person = self.catalog.person(id).await?;
        let summary = PersonSummary::from(&person);
        let credits = top_credits(person.credits, AVAILABILITY_CREDIT_LIMIT);

        let titles: Vec<_> = credits.iter().map(Credit::to_title).collect();
        let fetched = self.fetcher.fetch_all(&titles, region).await?;

        let filmography: Vec<CreditAvailability> = credits
            .into_iter()
            .zip(fetched.results)
            .map(|(credit, result)| {
                let available = result.offers.flatrate().next().is_some();
                CreditAvailability {
                available,
                unchecked: result.unavailable,
                offers: result.offers.offers,
                id: credit.id,
                media_type: credit.media_type,
                title: credit.title,
                poster_path: credit.poster_path,
                vote_average: credit.vote_average,
                release_date: credit.release_date,
                character: credit.character,
            }
            })
            .collect();

        tracing::info!(
            person_id = id,
            region = %region,
            credits = filmography.len(),
            available = filmography.iter().filter(|c| c.available).count(),
            "Person availability resolved"
        );

        Ok(PersonAvailability {
            person: summary,
            region: region.to_string(),
            filmography,
            failed_count: fetched.failed_count,
        })
    }
}

/// Most voted first; equal votes keep catalog order
fn top_credits(mut credits: Vec<Credit>, limit: usize) -> Vec<Credit> {
    credits.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    credits.truncate(limit);
    credits
}
