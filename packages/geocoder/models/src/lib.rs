#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the address search and resolution engine.
//!
//! This crate contains only data types and simple conversions. It has no
//! heavyweight dependencies (no HTTP, no async runtime).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rectilinear (taxicab) distance in degrees: `|Δlat| + |Δlon|`.
    #[must_use]
    pub fn manhattan_degrees(self, other: Self) -> f64 {
        (self.latitude - other.latitude).abs() + (self.longitude - other.longitude).abs()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Which provider produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CandidateSource {
    /// The commercial Places autocomplete provider.
    Primary,
    /// The open geocoding service, queried only when the primary is empty.
    Fallback,
}

impl CandidateSource {
    /// String tag used in cache keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }

    /// Tie-break priority between sources. Lower ranks first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Fallback => 1,
        }
    }
}

/// One address suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Display label shown in the suggestion list.
    pub label: String,
    /// Exact coordinates, when the provider returned them.
    pub coordinates: Option<Coordinates>,
    /// Ranking score. `None` means the candidate keeps its provider order.
    pub score: Option<f64>,
    /// Which provider produced this candidate.
    pub source: CandidateSource,
    /// Provider-side identifier used for a details lookup.
    pub external_id: Option<String>,
}

impl Candidate {
    /// A label-only candidate from the primary provider.
    #[must_use]
    pub fn primary(label: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            coordinates: None,
            score: None,
            source: CandidateSource::Primary,
            external_id: Some(external_id.into()),
        }
    }

    /// A fallback candidate with coordinates and a provisional score.
    #[must_use]
    pub fn fallback(label: impl Into<String>, coordinates: Coordinates, score: f64) -> Self {
        Self {
            label: label.into(),
            coordinates: Some(coordinates),
            score: Some(score),
            source: CandidateSource::Fallback,
            external_id: None,
        }
    }
}

/// A resolved address with exact coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    /// Exact coordinates.
    pub coordinates: Coordinates,
    /// Human-readable formatted address.
    pub formatted: String,
    /// Provider-side identifier, when known.
    pub external_id: Option<String>,
}

/// Raw reverse-geocode fields before formatting.
///
/// Mirrors the shape device reverse geocoders return: every field is
/// optional and providers disagree on where the house number lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placemark {
    /// Street name, sometimes with a trailing house number.
    pub street: Option<String>,
    /// Feature name. Often just the house number.
    pub name: Option<String>,
    /// Explicit house number.
    pub street_number: Option<String>,
    /// Neighborhood or commune.
    pub district: Option<String>,
    /// City or municipality.
    pub city: Option<String>,
    /// Province-level subdivision.
    pub subregion: Option<String>,
    /// Region / state.
    pub region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

/// A location the user confirmed on the edit screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedLocation {
    /// Formatted address label.
    pub label: String,
    /// Confirmed coordinates.
    pub coordinates: Coordinates,
}
