/// Read-through caching over a [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present; otherwise awaits `$block`, queues
/// the result for a background write with `$ttl` seconds and returns it.
/// Cache and block errors are propagated with `?`, so the enclosing
/// expression must produce an `AppResult`.
///
/// ```rust,ignore
/// async fn latest(&self, cache: &Cache, window: RecommendationWindow) -> AppResult<Vec<RecommendedItem>> {
///     cached!(cache, CacheKey::Latest(window), 60, self.fetch_list("latest", window))
/// }
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
