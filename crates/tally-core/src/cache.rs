//! Read-through cache in front of review queries.
//!
//! Entries are JSON strings keyed by query. The cache is only ever a copy:
//! writers invalidate after their transaction commits, and anything that
//! fails to decode is dropped and reloaded from the store.
//!
//! A fill that raced with an invalidation is discarded: readers note the
//! cache generation before loading and [`ReviewCache::fill`] refuses the
//! value if any delete happened since.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::TargetKind;

/// Key/value store holding serialized query results.
///
/// Implementations must be safe to share between threads. `delete` of a
/// missing key is not an error.
pub trait ReviewCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String);

    /// Store `value` unless an invalidation happened after `generation` was
    /// read. Returns whether the entry was kept.
    fn fill(&self, key: &str, value: String, generation: u64) -> bool;

    /// Invalidation counter. Advances on every `delete` and `delete_prefix`.
    fn generation(&self) -> u64;

    fn delete(&self, key: &str);

    /// Remove every key starting with `prefix`, returning how many were removed.
    fn delete_prefix(&self, prefix: &str) -> usize;
}

/// Process-local cache backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
    generation: AtomicU64,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReviewCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    // Insert first, then re-check. A delete bumps the generation before it
    // removes, so either it removes this entry or the check below sees it.
    fn fill(&self, key: &str, value: String, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.entries.insert(key.to_string(), value.clone());
        if self.generation() == generation {
            return true;
        }
        self.entries.remove_if(key, |_, cached| *cached == value);
        false
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn delete(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(key);
    }

    fn delete_prefix(&self, prefix: &str) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Cache that never stores anything. Every read goes to the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ReviewCache for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _value: String) {}

    fn fill(&self, _key: &str, _value: String, _generation: u64) -> bool {
        false
    }

    fn generation(&self) -> u64 {
        0
    }

    fn delete(&self, _key: &str) {}

    fn delete_prefix(&self, _prefix: &str) -> usize {
        0
    }
}

/// Return the cached value for `key`, or run `load` and cache its result.
///
/// A cached entry that no longer decodes as `T` is deleted and treated as a
/// miss. Loader errors are returned as-is and nothing is cached, and neither
/// is a loaded value if the cache was invalidated while `load` ran.
///
/// # Errors
///
/// Returns whatever `load` returns on failure.
pub fn get_or_set<T, E, F>(cache: &dyn ReviewCache, key: &str, load: F) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T, E>,
{
    if let Some(raw) = cache.get(key) {
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                cache.delete(key);
            }
        }
    }

    tracing::debug!(key, "cache miss");
    let generation = cache.generation();
    let value = load()?;
    match serde_json::to_string(&value) {
        Ok(raw) => {
            if !cache.fill(key, raw, generation) {
                tracing::debug!(key, "invalidated during load, not caching");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "failed to serialize cache entry"),
    }
    Ok(value)
}

/// Cache key layout.
pub mod keys {
    use super::TargetKind;

    /// Reviews of one kind for a seller.
    #[must_use]
    pub fn target(seller_id: &str, kind: TargetKind) -> String {
        format!("{}{kind}", target_prefix(seller_id))
    }

    /// Prefix covering every target key for a seller.
    #[must_use]
    pub fn target_prefix(seller_id: &str) -> String {
        format!("reviews:target:{seller_id}:")
    }

    #[must_use]
    pub fn reviewer(reviewer_id: &str) -> String {
        format!("reviews:reviewer:{reviewer_id}")
    }

    #[must_use]
    pub fn seller(seller_id: &str) -> String {
        format!("seller:{seller_id}")
    }
}

/// Drop every entry a review write for `seller_id` by `reviewer_id` can stale.
pub fn invalidate_review_keys(cache: &dyn ReviewCache, seller_id: &str, reviewer_id: &str) {
    let removed = cache.delete_prefix(&keys::target_prefix(seller_id));
    cache.delete(&keys::reviewer(reviewer_id));
    cache.delete(&keys::seller(seller_id));
    tracing::debug!(seller_id, reviewer_id, removed, "invalidated review cache keys");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_get_or_set_loads_once() {
        let cache = MemoryCache::new();
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok::<_, String>(vec![1, 2, 3])
        };

        let first: Vec<i32> = get_or_set(&cache, "k", load).unwrap();
        let second: Vec<i32> = get_or_set(&cache, "k", load).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.get("k").as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn test_loader_error_is_not_cached() {
        let cache = MemoryCache::new();
        let result: Result<Vec<i32>, &str> = get_or_set(&cache, "k", || Err("store down"));
        assert_eq!(result.unwrap_err(), "store down");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_undecodable_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.put("k", "{not json".to_string());

        let value: Vec<i32> = get_or_set(&cache, "k", || Ok::<_, String>(vec![7])).unwrap();
        assert_eq!(value, vec![7]);
        assert_eq!(cache.get("k").as_deref(), Some("[7]"));
    }

    #[test]
    fn test_fill_racing_invalidation_is_dropped() {
        let cache = MemoryCache::new();
        let key = keys::target("S", TargetKind::Seller);

        let loaded: Vec<i32> = get_or_set(&cache, &key, || {
            // A writer commits and invalidates while the old list is in hand.
            invalidate_review_keys(&cache, "S", "b");
            Ok::<_, String>(Vec::new())
        })
        .unwrap();
        assert!(loaded.is_empty());
        assert!(cache.get(&key).is_none());

        let fresh: Vec<i32> = get_or_set(&cache, &key, || Ok::<_, String>(vec![4])).unwrap();
        assert_eq!(fresh, vec![4]);
        assert_eq!(cache.get(&key).as_deref(), Some("[4]"));
    }

    #[test]
    fn test_fill_with_old_generation_is_refused() {
        let cache = MemoryCache::new();
        let generation = cache.generation();
        cache.delete("other");
        assert!(!cache.fill("k", "1".to_string(), generation));
        assert!(cache.is_empty());
        assert!(cache.fill("k", "1".to_string(), cache.generation()));
        assert_eq!(cache.get("k").as_deref(), Some("1"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.put("k", "1".to_string());
        cache.delete("k");
        cache.delete("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_delete_prefix_respects_separator() {
        let cache = MemoryCache::new();
        cache.put(&keys::target("S1", TargetKind::Seller), "[]".to_string());
        cache.put(&keys::target("S1", TargetKind::Service), "[]".to_string());
        cache.put(&keys::target("S10", TargetKind::Seller), "[]".to_string());

        assert_eq!(cache.delete_prefix(&keys::target_prefix("S1")), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&keys::target("S10", TargetKind::Seller)).is_some());
    }

    #[test]
    fn test_invalidate_review_keys() {
        let cache = MemoryCache::new();
        cache.put(&keys::target("S", TargetKind::Service), "[]".to_string());
        cache.put(&keys::reviewer("b"), "[]".to_string());
        cache.put(&keys::reviewer("c"), "[]".to_string());
        cache.put(&keys::seller("S"), "{}".to_string());

        invalidate_review_keys(&cache, "S", "b");
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&keys::reviewer("c")).is_some());
    }

    #[test]
    fn test_noop_cache_always_misses() {
        let cache = NoopCache;
        cache.put("k", "1".to_string());
        assert!(cache.get("k").is_none());
        assert_eq!(cache.delete_prefix(""), 0);
    }
}
