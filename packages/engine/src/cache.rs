//! In-memory result cache.
//!
//! Entries are keyed by normalized query and provider, written once, and
//! never evicted. The cache lives as long as the engine that owns it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use locator_geocoder_models::{Candidate, CandidateSource};

/// Cache key: lowercased normalized query plus provider tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    query: String,
    source: CandidateSource,
}

impl CacheKey {
    /// Builds a key. The query is lowercased so casing differences share
    /// one entry.
    #[must_use]
    pub fn new(normalized: &str, source: CandidateSource) -> Self {
        Self {
            query: normalized.to_lowercase(),
            source,
        }
    }
}

/// Write-once, read-many candidate cache.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<BTreeMap<CacheKey, Arc<[Candidate]>>>,
}

impl ResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached list.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<[Candidate]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores `candidates` under `key` unless an entry already exists.
    ///
    /// Returns whichever list ends up stored, so two racing writers both
    /// observe the winner.
    pub fn insert(&self, key: CacheKey, candidates: Vec<Candidate>) -> Arc<[Candidate]> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry(key)
                .or_insert_with(|| Arc::from(candidates)),
        )
    }

    /// Number of cached lists, empty answers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case() {
        assert_eq!(
            CacheKey::new("Av Providencia", CandidateSource::Primary),
            CacheKey::new("av providencia", CandidateSource::Primary)
        );
        assert_ne!(
            CacheKey::new("providencia", CandidateSource::Primary),
            CacheKey::new("providencia", CandidateSource::Fallback)
        );
    }

    #[test]
    fn first_write_wins() {
        let cache = ResultCache::new();
        let key = CacheKey::new("providencia", CandidateSource::Primary);

        let stored = cache.insert(key.clone(), vec![Candidate::primary("A", "1")]);
        assert_eq!(stored[0].label, "A");

        let stored = cache.insert(key.clone(), vec![Candidate::primary("B", "2")]);
        assert_eq!(stored[0].label, "A");
        assert_eq!(cache.get(&key).map(|c| c.len()), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stores_empty_lists() {
        let cache = ResultCache::new();
        let key = CacheKey::new("nowhere", CandidateSource::Fallback);
        cache.insert(key.clone(), Vec::new());
        assert!(cache.get(&key).is_some_and(|c| c.is_empty()));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ResultCache::new();
        cache.insert(CacheKey::new("a", CandidateSource::Primary), Vec::new());
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
