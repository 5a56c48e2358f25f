/*!
 * Token length caching.
 *
 * The chunker measures the same spans repeatedly while it grows a buffer, and
 * the statistics pass measures every unit again, so lengths are memoised for
 * the duration of a run.
 */

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use log::debug;

/// Length cache keyed by the measured text
pub struct LengthCache {
    /// Internal cache storage
    cache: Arc<RwLock<HashMap<String, usize>>>,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,

    /// Whether caching is enabled
    enabled: bool,
}

impl LengthCache {
    /// Create a new length cache
    pub fn new(enabled: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            enabled,
        }
    }

    /// Look up the length of a span
    pub fn get(&self, text: &str) -> Option<usize> {
        if !self.enabled {
            return None;
        }

        match self.cache.read().get(text) {
            Some(&length) => {
                *self.hits.write() += 1;
                Some(length)
            }
            None => {
                *self.misses.write() += 1;
                None
            }
        }
    }

    /// Store the length of a span
    pub fn store(&self, text: &str, length: usize) {
        if !self.enabled {
            return;
        }

        self.cache.write().insert(text.to_string(), length);
    }

    /// Get cache statistics as `(hits, misses, hit_rate)`
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;

        debug!("Length cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl Default for LengthCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Clone for LengthCache {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            enabled: self.enabled,
        }
    }
}

impl std::fmt::Debug for LengthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LengthCache")
            .field("entries", &self.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_afterStore_shouldCountHit() {
        let cache = LengthCache::new(true);
        assert_eq!(cache.get("Hello"), None);

        cache.store("Hello", 1);
        assert_eq!(cache.get("Hello"), Some(1));

        let (hits, misses, rate) = cache.stats();
        assert_eq!((hits, misses), (1, 1));
        assert!((rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disabledCache_shouldNeverStore() {
        let cache = LengthCache::new(false);
        cache.store("Hello", 1);

        assert!(cache.is_empty());
        assert_eq!(cache.get("Hello"), None);
        assert_eq!(cache.stats().1, 0);
    }

    #[test]
    fn test_clear_shouldResetEntriesAndCounters() {
        let cache = LengthCache::default();
        cache.store("a", 1);
        cache.get("a");
        let shared = cache.clone();

        shared.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats(), (0, 0, 0.0));
    }
}
