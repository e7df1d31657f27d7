pub mod availability;
pub mod calendar;
pub mod coverage;
pub mod enumerator;
pub mod filmography;
pub mod optimization;
pub mod provider_directory;
pub mod providers;
pub mod ranker;
pub mod watchlist;

pub use availability::AvailabilityFetcher;
pub use calendar::EpisodeCalendar;
pub use coverage::CoverageIndex;
pub use enumerator::{ComboEnumerator, EnumerationLimits};
pub use filmography::FilmographyLookup;
pub use optimization::Optimizer;
pub use provider_directory::{ProviderDirectory, ProviderTable};
pub use providers::{CatalogError, CatalogSource, TitleCatalog, TmdbCatalog};
pub use ranker::BundleRanker;
pub use watchlist::{MemoryWatchlistStore, PgWatchlistStore, WatchlistStore};
