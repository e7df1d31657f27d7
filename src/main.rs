use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use streamfinder_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache},
    routes::{create_router, AppState},
    services::{
        AvailabilityFetcher, EpisodeCalendar, FilmographyLookup, Optimizer, PgWatchlistStore,
        ProviderTable, TmdbCatalog,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("streamfinder_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        region = %config.watch_region,
        concurrency = config.fetch_concurrency,
        max_bundle_size = config.max_bundle_size,
        "Starting streamfinder API"
    );

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let directory = Arc::new(ProviderTable::load(&pool).await?);
    let watchlist = Arc::new(PgWatchlistStore::new(pool.clone()));

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_handle) = Cache::new(redis_client, config.cache_read_timeout());

    let catalog = Arc::new(TmdbCatalog::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.availability_cache_ttl_secs,
    ));

    let fetcher = AvailabilityFetcher::new(
        catalog.clone(),
        config.fetch_concurrency,
        config.fetch_timeout(),
    );
    let calendar = EpisodeCalendar::new(
        catalog.clone(),
        config.fetch_concurrency,
        config.calendar_days,
    );
    let filmography = FilmographyLookup::new(catalog.clone(), fetcher.clone());
    let optimizer = Arc::new(Optimizer::new(
        fetcher,
        directory.clone(),
        config.enumeration_limits(),
    ));

    let state = Arc::new(AppState {
        watchlist,
        directory,
        catalog,
        optimizer,
        calendar,
        filmography,
        default_region: config.watch_region.to_uppercase(),
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_handle.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
