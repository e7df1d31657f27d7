use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::{fmt::Display, sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot, OnceCell,
    },
    task::JoinHandle,
};

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::{MediaType, TitleKey};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Offers for one title in one region
    Availability { region: String, title: TitleKey },
    /// Every provider the catalog lists for a region and media type
    RegionProviders { region: String, media_type: MediaType },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Availability { region, title } => write!(
                f,
                "avail:{}:{}:{}",
                region.to_lowercase(),
                title.media_type,
                title.id
            ),
            CacheKey::RegionProviders { region, media_type } => {
                write!(f, "providers:{}:{}", region.to_lowercase(), media_type)
            }
        }
    }
}

/// Opens a Redis client; no connection is made until first use
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// Queued writes beyond this are dropped; the cache is best effort
const WRITE_QUEUE_CAPACITY: usize = 1024;
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on one background write, connect included
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

struct PendingWrite {
    key: String,
    value: String,
    ttl_secs: u64,
}

/// JSON values in Redis, read inline and written by a background task
///
/// Reads share one reconnecting connection and give up after
/// `read_timeout`, so a slow Redis degrades to a miss. Writes never block
/// the caller: they are queued and stored by a single writer task.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    reader: Arc<OnceCell<ConnectionManager>>,
    read_timeout: Duration,
    writes: mpsc::Sender<PendingWrite>,
}

/// Stops the background writer once the server is done
pub struct CacheWriterHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Stops intake and waits for queued writes to be stored
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        match tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Cache writer task panicked"),
            Err(_) => tracing::warn!("Cache writer did not finish flushing in time"),
        }
    }
}

impl Cache {
    /// Spawns the writer task; must be called inside a Tokio runtime
    pub fn new(client: Client, read_timeout: Duration) -> (Self, CacheWriterHandle) {
        let (writes, queue) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let (shutdown, stop) = oneshot::channel();

        let task = tokio::spawn(run_writer(client.clone(), queue, stop));

        let cache = Self {
            client,
            reader: Arc::new(OnceCell::new()),
            read_timeout,
            writes,
        };
        (cache, CacheWriterHandle { shutdown, task })
    }

    /// Reads and decodes a cached value, `None` on a miss
    ///
    /// A read slower than the configured timeout is an error, which the
    /// `cached!` macro treats like a miss.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let raw = tokio::time::timeout(self.read_timeout, self.read_raw(key))
            .await
            .map_err(|_| {
                AppError::Internal(format!(
                    "Cache read for {} timed out after {:?}",
                    key, self.read_timeout
                ))
            })??;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                AppError::Internal(format!("Corrupt cache entry {}: {}", key, e))
            })
        })
        .transpose()
    }

    async fn read_raw(&self, key: &CacheKey) -> AppResult<Option<String>> {
        let manager = self
            .reader
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;

        let mut conn = manager.clone();
        let raw: Option<String> = conn.get(key.to_string()).await?;
        Ok(raw)
    }

    /// Queues `value` under `key` with a TTL and returns immediately
    pub fn set_in_background<T: serde::Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl_secs: u64,
    ) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cannot encode cache value");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            value,
            ttl_secs,
        };

        match self.writes.try_send(write) {
            Ok(()) => {}
            Err(TrySendError::Full(w)) => {
                tracing::warn!(key = %w.key, "Cache write queue full, dropping write")
            }
            Err(TrySendError::Closed(w)) => {
                tracing::debug!(key = %w.key, "Cache writer stopped, dropping write")
            }
        }
    }
}

async fn run_writer(
    client: Client,
    mut queue: mpsc::Receiver<PendingWrite>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut conn: Option<ConnectionManager> = None;
    tracing::debug!("Cache writer started");

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(write) => store_bounded(&client, &mut conn, write).await,
                None => break,
            },
            _ = &mut stop => {
                queue.close();
                let mut flushed = 0usize;
                while let Some(write) = queue.recv().await {
                    store_bounded(&client, &mut conn, write).await;
                    flushed += 1;
                }
                tracing::info!(flushed, "Cache writer flushed and stopped");
                return;
            }
        }
    }

    tracing::debug!("Cache writer stopped, all caches dropped");
}

async fn store_bounded(client: &Client, conn: &mut Option<ConnectionManager>, write: PendingWrite) {
    let key = write.key.clone();
    if tokio::time::timeout(WRITE_TIMEOUT, store(client, conn, write))
        .await
        .is_err()
    {
        tracing::warn!(key = %key, "Cache write timed out, dropping it");
    }
}

/// Stores one write, reconnecting lazily; a failed write is logged and lost
async fn store(client: &Client, conn: &mut Option<ConnectionManager>, write: PendingWrite) {
    if conn.is_none() {
        match ConnectionManager::new(client.clone()).await {
            Ok(manager) => *conn = Some(manager),
            Err(e) => {
                tracing::error!(
                    key = %write.key,
                    error = %e,
                    "Cannot connect to Redis for cache write"
                );
                return;
            }
        }
    }

    if let Some(manager) = conn.as_mut() {
        let result: redis::RedisResult<()> =
            manager.set_ex(&write.key, &write.value, write.ttl_secs).await;
        if let Err(e) = result {
            tracing::error!(key = %write.key, error = %e, "Cache write failed");
        }
    }
}
