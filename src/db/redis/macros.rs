/// Get-or-compute through the Redis cache.
///
/// On a hit the cached value is returned. On a miss, or when the cache
/// cannot be read in time, `$block` is awaited, its value is queued for a
/// background write with `$ttl` seconds to live, and returned. Errors from
/// `$block` propagate with `?`.
///
/// # Example
/// ```rust,ignore
/// let offers: OfferSet = cached!(self.cache, key, ttl, async move {
///     self.call_api(title, region).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(cached)) => {
                tracing::debug!(key = %$key, "Cache hit");
                Ok(cached)
            }
            lookup => {
                if let Err(e) = lookup {
                    tracing::warn!(error = %e, key = %$key, "Cache read failed, fetching upstream");
                }
                let value = $block.await?;
                $cache.set_in_background(&$key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
