use serde::{Deserialize, Serialize};

/// TMDB watch-provider identifier (e.g. 8 = Netflix)
pub type ProviderId = i64;

/// Represents a streaming provider from the metadata table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMeta {
    pub provider_id: ProviderId,
    /// Name of the streaming service (e.g., "Netflix", "Crunchyroll")
    pub name: String,
    pub logo_path: Option<String>,
    /// Monthly cost in minor currency units; `None` means free or unknown
    pub monthly_cost_cents: Option<u32>,
    /// Provider search page used to build watch links
    pub search_url: Option<String>,
    /// Query parameter name the search page expects
    pub search_param: Option<String>,
}

impl ProviderMeta {
    /// Creates a provider entry with no search link configured
    pub fn new(
        provider_id: ProviderId,
        name: impl Into<String>,
        monthly_cost_cents: Option<u32>,
    ) -> Self {
        Self {
            provider_id,
            name: name.into(),
            logo_path: None,
            monthly_cost_cents,
            search_url: None,
            search_param: None,
        }
    }

    pub fn with_search(mut self, url: impl Into<String>, param: impl Into<String>) -> Self {
        self.search_url = Some(url.into());
        self.search_param = Some(param.into());
        self
    }

    /// Whether a price has been configured for this provider
    pub fn is_priced(&self) -> bool {
        self.monthly_cost_cents.is_some()
    }
}
