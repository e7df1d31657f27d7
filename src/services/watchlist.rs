use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, Title, TitleId, WatchlistEntry},
};

/// Persistent watchlist, newest entry first
///
/// Mutations return the full updated list so callers can render it without a
/// second round trip.
#[async_trait::async_trait]
pub trait WatchlistStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<WatchlistEntry>>;

    /// Inserts the entry unless `(id, media_type)` is already present
    async fn add(&self, entry: WatchlistEntry) -> AppResult<Vec<WatchlistEntry>>;

    async fn remove(&self, media_type: MediaType, id: TitleId) -> AppResult<Vec<WatchlistEntry>>;

    /// Snapshot of the watchlist as optimizer input
    async fn list_titles(&self) -> AppResult<Vec<Title>> {
        Ok(self.list().await?.iter().map(Title::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct WatchlistRow {
    id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    vote_average: f64,
    release_date: Option<String>,
    added_at: DateTime<Utc>,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = AppError;

    fn try_from(row: WatchlistRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            media_type: row.media_type.parse()?,
            title: row.title,
            poster_path: row.poster_path,
            vote_average: row.vote_average,
            release_date: row.release_date,
            added_at: row.added_at,
        })
    }
}

/// Postgres-backed watchlist (`watchlist` table)
#[derive(Clone)]
pub struct PgWatchlistStore {
    pool: PgPool,
}

impl PgWatchlistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WatchlistStore for PgWatchlistStore {
    async fn list(&self) -> AppResult<Vec<WatchlistEntry>> {
        let rows: Vec<WatchlistRow> = sqlx::query_as(
            r#"
            SELECT id, media_type, title, poster_path, vote_average, release_date, added_at
            FROM watchlist
            ORDER BY added_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WatchlistEntry::try_from).collect()
    }

    async fn add(&self, entry: WatchlistEntry) -> AppResult<Vec<WatchlistEntry>> {
        let result = sqlx::query(
            r#"
            INSERT INTO watchlist
                (id, media_type, title, poster_path, vote_average, release_date, added_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id, media_type) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.media_type.as_str())
        .bind(&entry.title)
        .bind(&entry.poster_path)
        .bind(entry.vote_average)
        .bind(&entry.release_date)
        .bind(entry.added_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            id = entry.id,
            media_type = %entry.media_type,
            inserted = result.rows_affected() > 0,
            "Watchlist add"
        );

        self.list().await
    }

    async fn remove(&self, media_type: MediaType, id: TitleId) -> AppResult<Vec<WatchlistEntry>> {
        let result = sqlx::query("DELETE FROM watchlist WHERE id = $1 AND media_type = $2")
            .bind(id)
            .bind(media_type.as_str())
            .execute(&self.pool)
            .await?;

        tracing::info!(
            id,
            media_type = %media_type,
            removed = result.rows_affected() > 0,
            "Watchlist remove"
        );

        self.list().await
    }
}

/// In-process watchlist for tests and database-less runs
#[derive(Default)]
pub struct MemoryWatchlistStore {
    entries: RwLock<Vec<WatchlistEntry>>,
}

impl MemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(entries: &[WatchlistEntry]) -> Vec<WatchlistEntry> {
    let mut sorted = entries.to_vec();
    // Stable sort keeps later insertions first among equal timestamps
    sorted.reverse();
    sorted.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    sorted
}

#[async_trait::async_trait]
impl WatchlistStore for MemoryWatchlistStore {
    async fn list(&self) -> AppResult<Vec<WatchlistEntry>> {
        Ok(newest_first(&self.entries.read().await))
    }

    async fn add(&self, entry: WatchlistEntry) -> AppResult<Vec<WatchlistEntry>> {
        let mut entries = self.entries.write().await;
        let exists = entries
            .iter()
            .any(|e| e.id == entry.id && e.media_type == entry.media_type);
        if !exists {
            entries.push(entry);
        }
        Ok(newest_first(&entries))
    }

    async fn remove(&self, media_type: MediaType, id: TitleId) -> AppResult<Vec<WatchlistEntry>> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !(e.id == id && e.media_type == media_type));
        Ok(newest_first(&entries))
    }
}
