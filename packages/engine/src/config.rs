//! Runtime configuration for the engine.
//!
//! Defaults suit the location-edit screen; each knob can be overridden
//! through a `LOCATOR_*` environment variable.

use std::str::FromStr;
use std::time::Duration;

use locator_normalizer::DEFAULT_LOCALITY;

use crate::scorer::ScoringPolicy;

/// Label shown when reverse geocoding fails entirely.
pub const DEFAULT_SENTINEL_LABEL: &str = "Ubicación seleccionada";

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Quiet period before a keystroke or map pan fires a query.
    pub quiet_period: Duration,
    /// Locality appended to labels and free-form fallback queries. Reverse
    /// labels read it here; pass the same value to the provider registry.
    pub default_locality: String,
    /// Label returned when reverse geocoding fails entirely.
    pub sentinel_label: String,
    /// Which candidates the scorer re-ranks.
    pub scoring: ScoringPolicy,
    /// Whether a provider's genuine "no results" answer is cached.
    pub cache_empty_results: bool,
    /// Zoom level used when the engine moves the map.
    pub map_zoom: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(300),
            default_locality: DEFAULT_LOCALITY.to_string(),
            sentinel_label: DEFAULT_SENTINEL_LABEL.to_string(),
            scoring: ScoringPolicy::FallbackOnly,
            cache_empty_results: true,
            map_zoom: 17.0,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment:
    ///
    /// - `LOCATOR_DEBOUNCE_MS`: quiet period in milliseconds
    /// - `LOCATOR_DEFAULT_LOCALITY`: fallback locality
    /// - `LOCATOR_SENTINEL_LABEL`: label for failed reverse lookups
    /// - `LOCATOR_RESCORE_PRIMARY`: `true` to rank primary candidates too
    /// - `LOCATOR_CACHE_EMPTY`: `false` to never cache empty answers
    /// - `LOCATOR_MAP_ZOOM`: zoom used for programmatic map moves
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let rescore_primary = parse_var(&lookup, "LOCATOR_RESCORE_PRIMARY", false);

        Self {
            quiet_period: Duration::from_millis(parse_var(
                &lookup,
                "LOCATOR_DEBOUNCE_MS",
                300_u64,
            )),
            default_locality: lookup("LOCATOR_DEFAULT_LOCALITY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_locality),
            sentinel_label: lookup("LOCATOR_SENTINEL_LABEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.sentinel_label),
            scoring: if rescore_primary {
                ScoringPolicy::All
            } else {
                ScoringPolicy::FallbackOnly
            },
            cache_empty_results: parse_var(
                &lookup,
                "LOCATOR_CACHE_EMPTY",
                defaults.cache_empty_results,
            ),
            map_zoom: parse_var(&lookup, "LOCATOR_MAP_ZOOM", defaults.map_zoom),
        }
    }
}

fn parse_var<T: FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    let Some(raw) = lookup(name) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        log::warn!("Ignoring invalid {name}={raw:?}");
        default
    })
}
