use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded LRU of query embeddings. Lookups refresh recency; inserting past
/// capacity evicts the least recently used entry.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<LruCache<String, Vec<f32>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(cap)) }
    }

    /// Cache key for a query: trimmed and lower-cased.
    pub fn key(text: &str) -> String {
        text.trim().to_lowercase()
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: String, value: Vec<f32>) {
        self.inner.lock().put(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        cache.put("a".into(), vec![1.0]);
        cache.put("b".into(), vec![2.0]);
        // touching "a" makes "b" the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c".into(), vec![3.0]);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(QueryCache::key("  Typical CPM "), "typical cpm");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(QueryCache::new(0).capacity(), 1);
    }
}
