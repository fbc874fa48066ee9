//! Persistent answer cache for registry probes.
//!
//! Every remote answer ("does `lodash` exist at registry.npmjs.org?", a
//! package document, a search result) is stored as text under
//! `(registry prefix, category, key)`. Entries older than the store's TTL are
//! misses; misses are probed, persisted and read back before being returned.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use crate::types::{ArtiscopeError, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Default time-to-live of a cached answer.
pub const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Kind of payload stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum CacheCategory {
    PackageInfo,
    Search,
    Org,
    PackageExists,
}

impl CacheCategory {
    /// Directory name of the category under a registry.
    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheCategory::PackageInfo => "package-info",
            CacheCategory::Search => "search",
            CacheCategory::Org => "org",
            CacheCategory::PackageExists => "package-exists",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Address of one cached answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub registry: String,
    pub category: CacheCategory,
    pub key: String,
}

impl CacheKey {
    pub fn new(registry: impl Into<String>, category: CacheCategory, key: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            category,
            key: key.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.registry, self.category, self.key)
    }
}

/// Text key-value store with a time-to-live.
pub trait CacheStore: Send + Sync {
    /// The stored value, or `None` when absent or older than the TTL.
    fn get(&self, key: &CacheKey) -> Result<Option<String>>;

    /// Store `value`, resetting the entry's age.
    fn put(&self, key: &CacheKey, value: &str) -> Result<()>;

    /// Drop one entry. Returns whether anything was removed.
    fn remove(&self, key: &CacheKey) -> Result<bool>;
}

/// Cache-backed answers to "does this name exist at this registry".
///
/// Concurrent probes for the same key are not coalesced: both run and the
/// last write wins.
#[derive(Clone)]
pub struct ExistenceOracle {
    store: Arc<dyn CacheStore>,
}

impl ExistenceOracle {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return the cached payload, probing and persisting it on a miss.
    ///
    /// A failed probe leaves the cache untouched.
    pub async fn get_or_probe<F, Fut>(
        &self,
        registry: &str,
        category: CacheCategory,
        key: &str,
        probe: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let cache_key = CacheKey::new(registry, category, key);

        if self.store.get(&cache_key)?.is_none() {
            trace!("Cache miss for {}", cache_key);
            let fresh = probe().await?;
            self.store.put(&cache_key, &fresh)?;
        } else {
            trace!("Cache hit for {}", cache_key);
        }

        self.store.get(&cache_key)?.ok_or_else(|| {
            ArtiscopeError::CacheError(format!("entry {} missing right after write", cache_key))
        })
    }

    /// Boolean answer stored as `"true"`/`"false"`.
    pub async fn exists<F, Fut>(
        &self,
        registry: &str,
        category: CacheCategory,
        key: &str,
        probe: F,
    ) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let value = self
            .get_or_probe(registry, category, key, || async move {
                probe().await.map(|exists| exists.to_string())
            })
            .await?;

        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ArtiscopeError::CorruptCacheValue {
                key: CacheKey::new(registry, category, key).to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;
    use tempfile::TempDir;

    const REGISTRY: &str = "https://registry.npmjs.org";

    fn days_ago(days: u64) -> FileTime {
        FileTime::from_system_time(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
    }

    async fn probe_counted(oracle: &ExistenceOracle, calls: &AtomicUsize, answer: bool) -> bool {
        oracle
            .exists(REGISTRY, CacheCategory::PackageExists, "lodash", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(answer)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_does_not_probe() {
        let oracle = ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL)));
        let calls = AtomicUsize::new(0);

        assert!(probe_counted(&oracle, &calls, true).await);
        // A different answer would show up if the probe ran again.
        assert!(probe_counted(&oracle, &calls, false).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_eight_days_old_is_refreshed_once() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path(), CACHE_TTL));
        let oracle = ExistenceOracle::new(cache.clone());
        let calls = AtomicUsize::new(0);

        assert!(probe_counted(&oracle, &calls, true).await);
        let path = cache.entry_path(&CacheKey::new(REGISTRY, CacheCategory::PackageExists, "lodash"));
        set_file_mtime(&path, days_ago(8)).unwrap();

        assert!(!probe_counted(&oracle, &calls, false).await);
        assert!(!probe_counted(&oracle, &calls, true).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_six_days_old_is_served() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path(), CACHE_TTL));
        let oracle = ExistenceOracle::new(cache.clone());
        let calls = AtomicUsize::new(0);

        assert!(probe_counted(&oracle, &calls, true).await);
        let path = cache.entry_path(&CacheKey::new(REGISTRY, CacheCategory::PackageExists, "lodash"));
        set_file_mtime(&path, days_ago(6)).unwrap();

        assert!(probe_counted(&oracle, &calls, false).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_is_not_cached() {
        let oracle = ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL)));

        let err = oracle
            .exists(REGISTRY, CacheCategory::PackageExists, "flaky", || async {
                Err(ArtiscopeError::Unauthorized("https://registry.npmjs.org/flaky".into()))
            })
            .await;
        assert!(err.is_err());

        let calls = AtomicUsize::new(0);
        let exists = oracle
            .exists(REGISTRY, CacheCategory::PackageExists, "flaky", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
            .await
            .unwrap();
        assert!(exists);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_fatal() {
        let store = Arc::new(MemoryCache::new(CACHE_TTL));
        store
            .put(&CacheKey::new(REGISTRY, CacheCategory::Org, "acme"), "maybe")
            .unwrap();
        let oracle = ExistenceOracle::new(store);

        let err = oracle
            .exists(REGISTRY, CacheCategory::Org, "acme", || async { Ok(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, ArtiscopeError::CorruptCacheValue { .. }));
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let oracle = ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL)));

        let info = oracle
            .get_or_probe(REGISTRY, CacheCategory::PackageInfo, "lodash", || async {
                Ok("{\"name\":\"lodash\"}".to_string())
            })
            .await
            .unwrap();
        assert_eq!(info, "{\"name\":\"lodash\"}");

        let exists = oracle
            .exists(REGISTRY, CacheCategory::PackageExists, "lodash", || async { Ok(false) })
            .await
            .unwrap();
        assert!(!exists);
    }
}
