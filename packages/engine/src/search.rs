//! Forward address search: cache, provider waterfall, ranking.
//!
//! Providers are tried in priority order. A provider is only consulted
//! when every provider before it returned zero candidates; results are
//! never merged across providers. The fallback provider gets the synonym
//! variants of the query in one call (`"Alameda 1500"` also covers
//! `"Avenida Libertador Bernardo O'Higgins 1500"`) and fits them into its
//! own request budget.

use std::sync::Arc;
use std::time::Instant;

use locator_geocoder::{CandidateProvider, ProviderResponse};
use locator_geocoder_models::{Candidate, CandidateSource, Coordinates, GeocodeResult};
use locator_normalizer::{apply_synonyms, sanitize_short, tokenize};
use tokio_util::sync::CancellationToken;

use crate::LocateError;
use crate::cache::{CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::scorer::{self, ScoringPolicy};

/// A normalized search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Text as typed.
    pub raw: String,
    /// Text after [`sanitize_short`].
    pub normalized: String,
    /// Lowercased match tokens of the normalized text.
    pub tokens: Vec<String>,
    /// When the query was issued.
    pub issued_at: Instant,
}

impl SearchQuery {
    /// Normalizes and tokenizes `raw`.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let normalized = sanitize_short(raw);
        let tokens = tokenize(&normalized);
        Self {
            raw: raw.to_string(),
            normalized,
            tokens,
            issued_at: Instant::now(),
        }
    }

    /// Returns `true` if nothing searchable is left after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Forward search over a provider waterfall.
pub struct AddressSearch {
    providers: Vec<Arc<dyn CandidateProvider>>,
    cache: ResultCache,
    scoring: ScoringPolicy,
    cache_empty_results: bool,
}

impl AddressSearch {
    /// Creates a search over `providers`, in waterfall order.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn CandidateProvider>>, config: &EngineConfig) -> Self {
        Self {
            providers,
            cache: ResultCache::new(),
            scoring: config.scoring,
            cache_empty_results: config.cache_empty_results,
        }
    }

    /// The result cache shared by every query on this search.
    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Live search for the text currently in the search box. Never fails;
    /// an empty list means nothing was found.
    pub async fn search(
        &self,
        text: &str,
        reference: Option<Coordinates>,
        cancel: &CancellationToken,
    ) -> Vec<Candidate> {
        self.resolve(&SearchQuery::new(text), reference, cancel)
            .await
    }

    /// Explicit search (the user pressed "search").
    ///
    /// A superseded submit yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// * [`LocateError::GeocodeNotFound`] if no provider has a candidate
    pub async fn submit(
        &self,
        text: &str,
        reference: Option<Coordinates>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, LocateError> {
        let candidates = self.search(text, reference, cancel).await;
        if candidates.is_empty() && !cancel.is_cancelled() {
            return Err(LocateError::GeocodeNotFound {
                query: text.trim().to_string(),
            });
        }
        Ok(candidates)
    }

    /// Runs `query` through the cache and provider waterfall, then ranks.
    ///
    /// Returns an empty list if `cancel` fires; a cancelled run never
    /// writes the cache.
    pub async fn resolve(
        &self,
        query: &SearchQuery,
        reference: Option<Coordinates>,
        cancel: &CancellationToken,
    ) -> Vec<Candidate> {
        if query.is_empty() {
            return Vec::new();
        }

        for provider in &self.providers {
            let source = provider.source();
            let key = CacheKey::new(&query.normalized, source);

            let candidates = if let Some(hit) = self.cache.get(&key) {
                log::debug!(
                    "Cache hit for '{}' ({}, {} candidates)",
                    query.normalized,
                    source.as_str(),
                    hit.len()
                );
                hit
            } else {
                let response = self.fetch(provider.as_ref(), &query.normalized, cancel).await;
                if cancel.is_cancelled() {
                    log::debug!("Search for '{}' superseded", query.normalized);
                    return Vec::new();
                }
                self.store(key, response)
            };

            if !candidates.is_empty() {
                return scorer::rank(candidates.to_vec(), &query.tokens, reference, self.scoring);
            }

            log::debug!(
                "{} has no candidates for '{}'",
                source.as_str(),
                query.normalized
            );
        }

        Vec::new()
    }

    /// Exact coordinates for a candidate: directly when it carries them,
    /// otherwise through its provider's details lookup.
    pub async fn details(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Option<GeocodeResult> {
        if let Some(coordinates) = candidate.coordinates {
            return Some(GeocodeResult {
                coordinates,
                formatted: candidate.label.clone(),
                external_id: candidate.external_id.clone(),
            });
        }

        let external_id = candidate.external_id.as_deref()?;
        let provider = self
            .providers
            .iter()
            .find(|p| p.source() == candidate.source)?;

        let mut result = provider.details(external_id, cancel).await?;
        if result.formatted.trim().is_empty() {
            result.formatted.clone_from(&candidate.label);
        }
        Some(result)
    }

    fn store(&self, key: CacheKey, response: ProviderResponse) -> Arc<[Candidate]> {
        let cacheable = response.is_answered()
            && (self.cache_empty_results || !response.candidates.is_empty());

        if cacheable {
            self.cache.insert(key, response.candidates)
        } else {
            Arc::from(response.candidates)
        }
    }

    async fn fetch(
        &self,
        provider: &dyn CandidateProvider,
        normalized: &str,
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        match provider.source() {
            CandidateSource::Primary => provider.search(normalized, cancel).await,
            CandidateSource::Fallback => {
                let spellings = apply_synonyms(normalized);
                log::debug!(
                    "Fallback search for '{normalized}' with {} spelling(s)",
                    spellings.len()
                );
                provider.search_any(&spellings, cancel).await
            }
        }
    }
}
