use std::collections::BTreeMap;

use reqwest::Url;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{ProviderId, ProviderMeta},
};

/// Fallback search page when a provider has no configured search URL
pub const FALLBACK_SEARCH_URL: &str = "https://www.themoviedb.org/search";
const FALLBACK_SEARCH_PARAM: &str = "query";

/// Read-only provider metadata: names, prices and search links
///
/// Provider ids missing from the directory are still valid coverage; they
/// just carry no price and no name.
pub trait ProviderDirectory: Send + Sync {
    fn lookup(&self, id: ProviderId) -> Option<&ProviderMeta>;

    /// Every configured provider, ascending by id
    fn all(&self) -> Vec<&ProviderMeta>;

    fn monthly_cost_cents(&self, id: ProviderId) -> Option<u32> {
        self.lookup(id).and_then(|meta| meta.monthly_cost_cents)
    }

    /// Search page for `title` on the provider's site
    fn provider_link(&self, id: ProviderId, title: &str) -> String {
        let (base, param) = self
            .lookup(id)
            .and_then(|meta| Some((meta.search_url.as_deref()?, meta.search_param.as_deref()?)))
            .unwrap_or((FALLBACK_SEARCH_URL, FALLBACK_SEARCH_PARAM));

        match Url::parse_with_params(base, &[(param, title)]) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(
                    provider_id = id,
                    url = %base,
                    error = %e,
                    "Invalid provider search URL"
                );
                fallback_link(title)
            }
        }
    }
}

fn fallback_link(title: &str) -> String {
    Url::parse_with_params(FALLBACK_SEARCH_URL, &[(FALLBACK_SEARCH_PARAM, title)])
        .map(|url| url.to_string())
        .unwrap_or_else(|_| FALLBACK_SEARCH_URL.to_string())
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    provider_id: i64,
    name: String,
    logo_path: Option<String>,
    monthly_cost_cents: Option<i32>,
    search_url: Option<String>,
    search_param: Option<String>,
}

impl From<ServiceRow> for ProviderMeta {
    fn from(row: ServiceRow) -> Self {
        Self {
            provider_id: row.provider_id,
            name: row.name,
            logo_path: row.logo_path,
            // Negative prices are treated as unconfigured
            monthly_cost_cents: row.monthly_cost_cents.and_then(|c| u32::try_from(c).ok()),
            search_url: row.search_url,
            search_param: row.search_param,
        }
    }
}

/// In-memory provider directory, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    providers: BTreeMap<ProviderId, ProviderMeta>,
}

impl ProviderTable {
    pub fn from_entries(entries: impl IntoIterator<Item = ProviderMeta>) -> Self {
        Self {
            providers: entries
                .into_iter()
                .map(|meta| (meta.provider_id, meta))
                .collect(),
        }
    }

    /// Loads the `streaming_services` table
    pub async fn load(pool: &PgPool) -> AppResult<Self> {
        let rows: Vec<ServiceRow> = sqlx::query_as(
            r#"
            SELECT provider_id, name, logo_path, monthly_cost_cents, search_url, search_param
            FROM streaming_services
            ORDER BY provider_id
            "#,
        )
        .fetch_all(pool)
        .await?;

        let table = Self::from_entries(rows.into_iter().map(ProviderMeta::from));

        tracing::info!(
            providers = table.len(),
            priced = table.providers.values().filter(|m| m.is_priced()).count(),
            "Loaded provider directory"
        );

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderDirectory for ProviderTable {
    fn lookup(&self, id: ProviderId) -> Option<&ProviderMeta> {
        self.providers.get(&id)
    }

    fn all(&self) -> Vec<&ProviderMeta> {
        self.providers.values().collect()
    }
}
