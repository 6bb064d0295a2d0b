#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Provider adapters for address search and reverse geocoding.
//!
//! Two independent backends are configured via TOML files in `services/`:
//!
//! 1. **Google Places** (priority 1): autocomplete scoped to one country
//!    and language. Returns labels only; a details call resolves exact
//!    coordinates. Requires an API key.
//! 2. **Nominatim / OpenStreetMap** (priority 2): structured and
//!    free-form search bounded to the regional viewbox, plus reverse
//!    geocoding. Requires a descriptive `User-Agent`.
//!
//! Every adapter normalizes provider-specific shapes into the shared
//! [`Candidate`] type at the boundary, and every failure (HTTP error,
//! non-success status, timeout, cancellation) into an empty
//! [`ProviderResponse`]. Callers never branch on provider errors.

pub mod google_places;
pub mod guard;
pub mod nominatim;
pub mod service_registry;

use async_trait::async_trait;
use locator_geocoder_models::{Candidate, CandidateSource, Coordinates, GeocodeResult, Placemark};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from provider calls. These never leave the adapter boundary;
/// see [`guard::settle`].
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider answered with a non-success status.
    #[error("{provider} returned status {status}")]
    Status {
        /// Which provider.
        provider: &'static str,
        /// HTTP status or provider status string.
        status: String,
    },

    /// The provider did not answer within the configured bound.
    #[error("{provider} did not respond within {timeout_ms} ms")]
    Timeout {
        /// Which provider.
        provider: &'static str,
        /// The bound that elapsed.
        timeout_ms: u64,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,
}

/// Whether the provider actually answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The provider answered (possibly with zero candidates).
    Answered,
    /// The call failed, timed out, or was cancelled.
    Unavailable,
}

/// The normalized outcome of one forward-search call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Candidates in provider order. Empty on failure.
    pub candidates: Vec<Candidate>,
    /// Whether the provider answered.
    pub status: ResponseStatus,
}

impl ProviderResponse {
    /// A response the provider actually gave.
    #[must_use]
    pub const fn answered(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            status: ResponseStatus::Answered,
        }
    }

    /// An empty response standing in for a failed call.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            candidates: Vec::new(),
            status: ResponseStatus::Unavailable,
        }
    }

    /// Returns `true` if the provider answered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.status == ResponseStatus::Answered
    }

    /// Returns `true` if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A forward-search backend.
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    /// Which source tag this provider's candidates carry.
    fn source(&self) -> CandidateSource;

    /// Searches for candidates. Never fails; failures are empty and
    /// [`ResponseStatus::Unavailable`].
    async fn search(&self, query: &str, cancel: &CancellationToken) -> ProviderResponse;

    /// Searches for one query given as several spellings, most literal
    /// first. Providers that can fold spellings into their own bounded
    /// request set override this; the default searches the first only.
    async fn search_any(
        &self,
        queries: &[String],
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        match queries.first() {
            Some(query) => self.search(query, cancel).await,
            None => ProviderResponse::answered(Vec::new()),
        }
    }

    /// Resolves a candidate's external id to exact coordinates.
    async fn details(
        &self,
        _external_id: &str,
        _cancel: &CancellationToken,
    ) -> Option<GeocodeResult> {
        None
    }
}

/// A coordinates → raw address backend.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Looks up the address at `coordinates`. `None` on failure or when the
    /// point has no address.
    async fn reverse(
        &self,
        coordinates: Coordinates,
        cancel: &CancellationToken,
    ) -> Option<Placemark>;
}
