//! Resolved reference cache
//!
//! Entries are keyed by normalized genre and validated against the SHA-256
//! of the raw document bytes. A lookup with a different hash drops the
//! entry, so an edited reference file is re-resolved on the next load.

use mq_score::ReferenceDocument;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of genres kept resolved
pub const DEFAULT_CAPACITY: usize = 32;

struct CacheEntry {
    content_hash: String,
    document: Arc<ReferenceDocument>,
    last_access: u64,
}

/// Thread-safe LRU cache of resolved reference documents
pub struct ReferenceCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReferenceCache {
    /// Create a cache holding at most `capacity` genres
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Hex SHA-256 of raw document bytes
    pub fn content_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cached document for `genre` if it was resolved from the same content
    pub fn get(&self, genre: &str, content_hash: &str) -> Option<Arc<ReferenceDocument>> {
        let mut entries = self.entries.write();

        let stale = match entries.get_mut(genre) {
            Some(entry) if entry.content_hash == content_hash => {
                entry.last_access = self.tick();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.document));
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            entries.remove(genre);
            log::info!("[RefStore] {} changed on disk, cached reference dropped", genre);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a resolved document, evicting the least recently used genre when full
    pub fn insert(
        &self,
        genre: &str,
        content_hash: String,
        document: ReferenceDocument,
    ) -> Arc<ReferenceDocument> {
        let document = Arc::new(document);
        let mut entries = self.entries.write();

        if let Some(previous) = entries.get(genre) {
            if previous.document.version != document.version {
                log::info!(
                    "[RefStore] {} version {:?} -> {:?}",
                    genre,
                    previous.document.version,
                    document.version
                );
            }
        } else if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                log::debug!("[RefStore] evicting {}", key);
                entries.remove(&key);
            }
        }

        entries.insert(
            genre.to_string(),
            CacheEntry {
                content_hash,
                document: Arc::clone(&document),
                last_access: self.tick(),
            },
        );
        document
    }

    /// Drop one genre; returns whether it was cached
    pub fn invalidate(&self, genre: &str) -> bool {
        self.entries.write().remove(genre).is_some()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, genre: &str) -> bool {
        self.entries.read().contains_key(genre)
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(genre: &str, version: &str) -> ReferenceDocument {
        let mut doc = ReferenceDocument::new(genre).with_lufs(-14.0, 1.0);
        doc.version = Some(version.to_string());
        doc
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = ReferenceCache::content_hash(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hit_requires_same_hash() {
        let cache = ReferenceCache::default();
        let stored = cache.insert("pop", "h1".into(), doc("pop", "1"));

        let hit = cache.get("pop", "h1").unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));

        assert!(cache.get("pop", "h2").is_none());
        assert!(!cache.contains("pop"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ReferenceCache::new(2);
        cache.insert("pop", "a".into(), doc("pop", "1"));
        cache.insert("rock", "b".into(), doc("rock", "1"));
        assert!(cache.get("pop", "a").is_some());

        cache.insert("trap", "c".into(), doc("trap", "1"));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("pop"));
        assert!(!cache.contains("rock"));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let cache = ReferenceCache::new(2);
        cache.insert("pop", "a".into(), doc("pop", "1"));
        cache.insert("rock", "b".into(), doc("rock", "1"));
        cache.insert("pop", "a2".into(), doc("pop", "2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get("pop", "a2").unwrap().version.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ReferenceCache::default();
        cache.insert("pop", "a".into(), doc("pop", "1"));
        cache.insert("rock", "b".into(), doc("rock", "1"));

        assert!(cache.invalidate("pop"));
        assert!(!cache.invalidate("pop"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
