//! Nominatim / OpenStreetMap client.
//!
//! Used as the fallback forward-search provider when Places returns
//! nothing, and as the reverse geocoder. Every request is bounded to the
//! regional viewbox and carries the descriptive `User-Agent` the public
//! instance's usage policy requires. The public instance allows one request
//! per second, so requests through one client are spaced by
//! `rate_limit_ms` from the service file.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use locator_geocoder_models::{Candidate, CandidateSource, Coordinates, Placemark};
use locator_normalizer::{format_reverse_address_with, sanitize_short};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::guard::{guarded, settle};
use crate::{CandidateProvider, GeocodeError, ProviderResponse, ReverseGeocoder};

const PROVIDER: &str = "Nominatim";

/// Maximum number of requests per fallback search, however many spellings
/// of the query the caller passes.
pub const MAX_VARIANTS: usize = 3;

/// Regional bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewbox {
    /// Western longitude.
    pub west: f64,
    /// Southern latitude.
    pub south: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Northern latitude.
    pub north: f64,
}

impl Viewbox {
    /// Formats as Nominatim's `viewbox=<x1>,<y1>,<x2>,<y2>` parameter.
    #[must_use]
    pub fn to_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.north, self.east, self.south)
    }

    /// Returns `true` if the point lies inside the box.
    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}

/// Connection settings for a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Search endpoint.
    pub search_url: String,
    /// Reverse endpoint.
    pub reverse_url: String,
    /// Descriptive client identifier sent as `User-Agent`.
    pub user_agent: String,
    /// Locality appended to free-form queries and formatted labels. Comes
    /// from the engine configuration so forward and reverse labels agree.
    pub locality: String,
    /// Comma-separated ISO country codes.
    pub country_codes: String,
    /// Preferred response language.
    pub language: String,
    /// Regional bounding box.
    pub viewbox: Viewbox,
    /// Results per request.
    pub limit: usize,
    /// Bound on every request, including time spent waiting for a slot.
    pub timeout: Duration,
    /// Minimum spacing between requests.
    pub rate_limit: Duration,
}

/// One request shape sent to the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchVariant {
    /// Structured `street` + `city` search.
    Structured {
        /// Street and house number.
        street: String,
        /// City or commune.
        city: String,
    },
    /// Unstructured `q` search.
    Freeform(String),
}

impl fmt::Display for SearchVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured { street, city } => write!(f, "street={street} city={city}"),
            Self::Freeform(q) => write!(f, "q={q}"),
        }
    }
}

/// Builds up to [`MAX_VARIANTS`] request shapes for one query, given as
/// `queries` (the typed text first, then alternative spellings):
///
/// 1. Structured: first segment as street, second segment (or the default
///    locality) as city
/// 2. Free-form with the locality appended, unless already present
/// 3. Each alternative spelling, free-form with the locality appended
/// 4. Free-form as typed
///
/// Repeated shapes are dropped before the list is cut to [`MAX_VARIANTS`].
#[must_use]
pub fn build_search_variants(queries: &[String], locality: &str) -> Vec<SearchVariant> {
    let mut queries = queries
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let Some(query) = queries.next() else {
        return Vec::new();
    };

    let (street, city) = query
        .split_once(',')
        .map_or((query, ""), |(s, c)| (s.trim(), c.trim()));
    let city = if city.is_empty() { locality } else { city };

    let mut variants = vec![
        SearchVariant::Structured {
            street: street.to_string(),
            city: city.to_string(),
        },
        SearchVariant::Freeform(with_locality(query, locality)),
    ];
    variants.extend(queries.map(|q| SearchVariant::Freeform(with_locality(q, locality))));
    variants.push(SearchVariant::Freeform(query.to_string()));

    let mut seen = BTreeSet::new();
    variants.retain(|v| seen.insert(v.to_string().to_lowercase()));
    variants.truncate(MAX_VARIANTS);
    variants
}

fn with_locality(query: &str, locality: &str) -> String {
    if query.to_lowercase().contains(&locality.to_lowercase()) {
        query.to_string()
    } else {
        format!("{query}, {locality}")
    }
}

/// Hands out request slots at least `interval` apart, in arrival order.
#[derive(Debug)]
struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits for the next free slot. Dropping the future gives the slot up.
    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            tokio::time::sleep_until(at).await;
        }
        *next_slot = Some(Instant::now() + self.interval);
    }
}

/// Nominatim client.
pub struct NominatimClient {
    client: reqwest::Client,
    config: NominatimConfig,
    pacer: Pacer,
}

impl NominatimClient {
    /// Creates a new client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: NominatimConfig) -> Self {
        let pacer = Pacer::new(config.rate_limit);
        Self {
            client,
            config,
            pacer,
        }
    }

    /// Searches the request variants built from `queries` (see
    /// [`build_search_variants`]) and merges the results in variant order,
    /// deduplicated by label. At most [`MAX_VARIANTS`] requests are sent.
    ///
    /// The response is answered if at least one variant answered.
    pub async fn fetch_fallback_search(
        &self,
        queries: &[String],
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        let variants = build_search_variants(queries, &self.config.locality);
        if variants.is_empty() {
            return ProviderResponse::answered(Vec::new());
        }

        let results = join_all(variants.iter().map(|variant| {
            guarded(
                PROVIDER,
                self.config.timeout,
                cancel,
                self.search_variant(variant),
            )
        }))
        .await;

        let mut answered = false;
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();

        for (variant, result) in variants.iter().zip(results) {
            let Some(found) = settle(PROVIDER, &variant.to_string(), result) else {
                continue;
            };
            answered = true;
            for candidate in found {
                if seen.insert(candidate.label.to_lowercase()) {
                    candidates.push(candidate);
                }
            }
        }

        if answered {
            log::debug!(
                "Nominatim: {} candidates across {} variants, starting with {}",
                candidates.len(),
                variants.len(),
                variants[0]
            );
            ProviderResponse::answered(candidates)
        } else {
            ProviderResponse::unavailable()
        }
    }

    /// Reverse-geocodes a point into raw placemark fields.
    pub async fn fetch_reverse(
        &self,
        coordinates: Coordinates,
        cancel: &CancellationToken,
    ) -> Option<Placemark> {
        let result = guarded(
            PROVIDER,
            self.config.timeout,
            cancel,
            self.reverse_request(coordinates),
        )
        .await;

        settle(PROVIDER, &coordinates.to_string(), result).flatten()
    }

    async fn search_variant(&self, variant: &SearchVariant) -> Result<Vec<Candidate>, GeocodeError> {
        self.pacer.wait().await;

        let viewbox = self.config.viewbox.to_param();
        let limit = self.config.limit.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("format", "jsonv2"),
            ("addressdetails", "1"),
            ("countrycodes", self.config.country_codes.as_str()),
            ("accept-language", self.config.language.as_str()),
            ("viewbox", viewbox.as_str()),
            ("bounded", "1"),
            ("limit", limit.as_str()),
        ];

        match variant {
            SearchVariant::Structured { street, city } => {
                params.push(("street", street.as_str()));
                params.push(("city", city.as_str()));
            }
            SearchVariant::Freeform(q) => params.push(("q", q.as_str())),
        }

        let resp = self
            .client
            .get(&self.config.search_url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&params)
            .send()
            .await?;

        check_http_status(&resp)?;

        let body: serde_json::Value = resp.json().await?;
        parse_search(&body, &self.config.locality)
    }

    async fn reverse_request(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<Placemark>, GeocodeError> {
        self.pacer.wait().await;

        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        let resp = self
            .client
            .get(&self.config.reverse_url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("zoom", "18"),
                ("accept-language", self.config.language.as_str()),
            ])
            .send()
            .await?;

        check_http_status(&resp)?;

        let body: serde_json::Value = resp.json().await?;
        parse_reverse(&body)
    }
}

fn check_http_status(resp: &reqwest::Response) -> Result<(), GeocodeError> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }

    if !resp.status().is_success() {
        return Err(GeocodeError::Status {
            provider: PROVIDER,
            status: resp.status().to_string(),
        });
    }

    Ok(())
}

fn str_field<'a>(value: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Maps a Nominatim `address` object (plus the top-level `name`) onto
/// placemark fields.
fn placemark_from(entry: &serde_json::Value) -> Option<Placemark> {
    let address = entry.get("address")?;
    let owned = |keys: &[&str]| str_field(address, keys).map(String::from);

    Some(Placemark {
        street: owned(&["road", "pedestrian", "footway"]),
        name: str_field(entry, &["name"]).map(String::from),
        street_number: owned(&["house_number"]),
        district: owned(&["suburb", "city_district", "neighbourhood"]),
        city: owned(&["city", "town", "village", "municipality"]),
        subregion: owned(&["county", "province"]),
        region: owned(&["state", "region"]),
        postal_code: owned(&["postcode"]),
        country: owned(&["country"]),
    })
}

fn parse_coordinate(entry: &serde_json::Value, key: &str) -> Option<f64> {
    entry[key].as_str().and_then(|s| s.parse::<f64>().ok())
}

/// Builds the display label for a search hit.
///
/// Hits with a road use the reverse-address format so forward and reverse
/// labels look alike; everything else falls back to the shortened
/// `display_name`.
fn candidate_label(entry: &serde_json::Value, locality: &str) -> Option<String> {
    let with_road = placemark_from(entry)
        .filter(|p| p.street.is_some())
        .map(|p| format_reverse_address_with(&p, locality));

    with_road
        .or_else(|| str_field(entry, &["display_name"]).map(sanitize_short))
        .filter(|label| !label.is_empty())
}

/// Parses a Nominatim search response into fallback candidates.
///
/// The provisional score is Nominatim's `importance`. Entries without
/// usable coordinates or label are skipped.
fn parse_search(body: &serde_json::Value, locality: &str) -> Result<Vec<Candidate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    Ok(results
        .iter()
        .filter_map(|entry| {
            let (Some(lat), Some(lon)) = (
                parse_coordinate(entry, "lat"),
                parse_coordinate(entry, "lon"),
            ) else {
                log::debug!("Nominatim: skipping entry without coordinates");
                return None;
            };
            let label = candidate_label(entry, locality)?;
            let importance = entry["importance"].as_f64().unwrap_or(0.0);
            Some(Candidate::fallback(
                label,
                Coordinates::new(lat, lon),
                importance,
            ))
        })
        .collect())
}

/// Parses a Nominatim reverse response.
///
/// `{"error": "Unable to geocode"}` means the point has no address.
fn parse_reverse(body: &serde_json::Value) -> Result<Option<Placemark>, GeocodeError> {
    if body.get("error").is_some() {
        return Ok(None);
    }

    placemark_from(body)
        .map(Some)
        .ok_or_else(|| GeocodeError::Parse {
            message: "Nominatim reverse response missing 'address'".to_string(),
        })
}

#[async_trait]
impl CandidateProvider for NominatimClient {
    fn source(&self) -> CandidateSource {
        CandidateSource::Fallback
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ProviderResponse {
        self.fetch_fallback_search(&[query.to_string()], cancel).await
    }

    async fn search_any(
        &self,
        queries: &[String],
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        self.fetch_fallback_search(queries, cancel).await
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(
        &self,
        coordinates: Coordinates,
        cancel: &CancellationToken,
    ) -> Option<Placemark> {
        self.fetch_reverse(coordinates, cancel).await
    }
}
