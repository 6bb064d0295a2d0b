//! Compile-time registry of geocoding provider configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The registry
//! embeds these at compile time and exposes them via [`all_services`] and
//! [`enabled_services`]. [`ProviderSet`] turns the enabled services into
//! live clients in waterfall order.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::google_places::{GooglePlacesClient, GooglePlacesConfig};
use crate::nominatim::{NominatimClient, NominatimConfig, Viewbox};
use crate::{CandidateProvider, ReverseGeocoder};

/// One geocoding backend as described by its `services/*.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"google_places"`, `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service takes part in the waterfall.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Waterfall order; lower values run first.
    pub priority: u32,
    /// Bound on every request to this service.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Endpoint settings.
    pub provider: ProviderConfig,
}

/// Endpoint settings per backend, selected by the `type` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Places Autocomplete + Details.
    GooglePlaces {
        /// Autocomplete endpoint.
        autocomplete_url: String,
        /// Details endpoint.
        details_url: String,
        /// ISO country code for the `components` filter.
        country: String,
        /// Response language.
        language: String,
        /// Maximum predictions kept per query.
        #[serde(default = "default_max_results")]
        max_results: usize,
        /// Name of the environment variable holding the API key.
        api_key_env: String,
    },
    /// Nominatim / `OpenStreetMap` search and reverse.
    Nominatim(NominatimSettings),
}

/// Endpoint settings for a Nominatim instance. The locality is not part of
/// the service file; callers pass the engine's so every label agrees.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimSettings {
    /// Search endpoint.
    pub search_url: String,
    /// Reverse endpoint.
    pub reverse_url: String,
    /// Descriptive `User-Agent` required by the usage policy.
    pub user_agent: String,
    /// Comma-separated ISO country codes.
    pub country_codes: String,
    /// Preferred response language.
    pub language: String,
    /// Regional bounding box.
    pub viewbox: Viewbox,
    /// Results per request.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum spacing between requests (public instance: 1 req/sec).
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl NominatimSettings {
    /// Client settings for this instance, labelling with `locality`.
    #[must_use]
    pub fn client_config(&self, locality: &str, timeout: Duration) -> NominatimConfig {
        NominatimConfig {
            search_url: self.search_url.clone(),
            reverse_url: self.reverse_url.clone(),
            user_agent: self.user_agent.clone(),
            locality: locality.to_string(),
            country_codes: self.country_codes.clone(),
            language: self.language.clone(),
            viewbox: self.viewbox,
            limit: self.limit,
            timeout,
            rate_limit: Duration::from_millis(self.rate_limit_ms),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_max_results() -> usize {
    12
}

const fn default_limit() -> usize {
    8
}

const fn default_rate_limit_ms() -> u64 {
    1_000
}

impl GeocodingService {
    /// Returns the provider's primary endpoint regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::GooglePlaces {
                autocomplete_url, ..
            } => autocomplete_url,
            ProviderConfig::Nominatim(settings) => &settings.search_url,
        }
    }

    /// The request bound as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// One file per service under `services/`, embedded at build time.
const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("google_places", include_str!("../services/google_places.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
];

/// Every configured service, enabled or not, in file order.
///
/// # Panics
///
/// Panics if an embedded service file is malformed.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Malformed service file '{name}.toml': {e}"))
        })
        .collect()
}

/// Enabled services in waterfall order.
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

/// Live provider clients built from the registry.
#[derive(Clone, Default)]
pub struct ProviderSet {
    /// Forward-search providers in waterfall order.
    pub forward: Vec<Arc<dyn CandidateProvider>>,
    /// Reverse geocoder, if any service offers one.
    pub reverse: Option<Arc<dyn ReverseGeocoder>>,
}

impl ProviderSet {
    /// Builds clients for the enabled services. `locality` is appended to
    /// free-form queries and candidate labels.
    ///
    /// API keys are read from the environment; a keyed provider whose key is
    /// missing is skipped with a warning.
    #[must_use]
    pub fn from_registry(client: &reqwest::Client, locality: &str) -> Self {
        Self::from_services(client, &enabled_services(), locality, |name| {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        })
    }

    /// Builds clients for `services` (already in waterfall order), looking up
    /// secrets through `env`.
    #[must_use]
    pub fn from_services(
        client: &reqwest::Client,
        services: &[GeocodingService],
        locality: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut set = Self::default();

        for service in services {
            match &service.provider {
                ProviderConfig::GooglePlaces {
                    autocomplete_url,
                    details_url,
                    country,
                    language,
                    max_results,
                    api_key_env,
                } => {
                    let Some(api_key) = env(api_key_env) else {
                        log::warn!(
                            "{} disabled: {api_key_env} is not set",
                            service.name
                        );
                        continue;
                    };
                    let places = GooglePlacesClient::new(
                        client.clone(),
                        GooglePlacesConfig {
                            autocomplete_url: autocomplete_url.clone(),
                            details_url: details_url.clone(),
                            country: country.clone(),
                            language: language.clone(),
                            max_results: *max_results,
                            api_key,
                            timeout: service.timeout(),
                        },
                    );
                    set.forward.push(Arc::new(places));
                }
                ProviderConfig::Nominatim(settings) => {
                    let nominatim = Arc::new(NominatimClient::new(
                        client.clone(),
                        settings.client_config(locality, service.timeout()),
                    ));
                    set.forward.push(nominatim.clone());
                    if set.reverse.is_none() {
                        set.reverse = Some(nominatim);
                    }
                }
            }
            log::debug!("Geocoding service '{}' ready", service.id);
        }

        set
    }
}
