use crate::cache::{CacheKey, CacheStore};
use crate::types::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache entry with TTL.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe in-process cache, used where nothing should touch disk.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if Instant::now() < entry.expires_at {
            return Ok(Some(entry.value.clone()));
        }
        // Entry expired, remove it
        drop(entry);
        self.entries.remove(key);
        Ok(None)
    }

    fn put(&self, key: &CacheKey, value: &str) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheCategory;

    fn key(k: &str) -> CacheKey {
        CacheKey::new("https://pypi.org", CacheCategory::PackageExists, k)
    }

    #[test]
    fn test_cache_set_get() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put(&key("requests"), "true").unwrap();

        assert_eq!(cache.get(&key("requests")).unwrap().as_deref(), Some("true"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        assert!(cache.get(&key("nonexistent")).unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.put(&key("requests"), "true").unwrap();

        assert!(cache.get(&key("requests")).unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put(&key("requests"), "false").unwrap();
        assert!(cache.remove(&key("requests")).unwrap());
        assert!(!cache.remove(&key("requests")).unwrap());
    }
}
