// Keyed client cache for probes that reuse connections across runs

use crate::domain::ProbeError;
use dashmap::DashMap;
use std::future::Future;
use tracing::debug;

/// Cache of client handles keyed by connection string
///
/// Owned by the probe that uses it, never by the engine. Values are
/// typically `Arc<Client>`; cloning hands out a shared handle.
///
/// The factory runs without any map shard locked, so two concurrent misses
/// on one key may both connect; the first insert wins and the loser's handle
/// is dropped.
pub struct ConnectionCache<V> {
    entries: DashMap<String, V>,
}

impl<V> ConnectionCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Cached handle for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Return the cached handle, or build and insert one if absent
    ///
    /// # Errors
    /// Whatever the factory fails with; nothing is cached in that case.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, factory: F) -> Result<V, ProbeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ProbeError>>,
    {
        if let Some(existing) = self.get(key) {
            return Ok(existing);
        }

        let created = factory().await?;
        let stored = self
            .entries
            .entry(key.to_string())
            .or_insert(created)
            .value()
            .clone();

        debug!(key = %key, cached = self.entries.len(), "Client handle cached");
        Ok(stored)
    }

    /// Drop the handle for `key` (call after a failure on that handle)
    pub fn invalidate(&self, key: &str) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, value)| value);
        if removed.is_some() {
            debug!(key = %key, "Client handle invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for ConnectionCache<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_factory_runs_once_per_key() {
        let cache: ConnectionCache<Arc<String>> = ConnectionCache::new();
        let built = AtomicUsize::new(0);

        for _ in 0..3 {
            let handle = cache
                .get_or_try_insert_with("postgres://a", || async {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new("conn-a".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(handle.as_str(), "conn-a");
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_factory_error_is_not_cached() {
        let cache: ConnectionCache<Arc<String>> = ConnectionCache::new();

        let result = cache
            .get_or_try_insert_with("redis://down", || async {
                Err(ProbeError::Connection("refused".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let cache: ConnectionCache<u32> = ConnectionCache::new();

        cache
            .get_or_try_insert_with("k", || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(cache.invalidate("k"), Some(1));
        assert_eq!(cache.invalidate("k"), None);

        let rebuilt = cache
            .get_or_try_insert_with("k", || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(rebuilt, 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let cache: ConnectionCache<&'static str> = ConnectionCache::new();

        tokio_test::block_on(async {
            cache.get_or_try_insert_with("a", || async { Ok("A") }).await.unwrap();
            cache.get_or_try_insert_with("b", || async { Ok("B") }).await.unwrap();
        });

        assert_eq!(cache.get("a"), Some("A"));
        assert_eq!(cache.get("b"), Some("B"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
