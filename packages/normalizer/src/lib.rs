#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address text normalization for the location search engine.
//!
//! Pure, side-effect-free string transforms:
//!
//! - [`sanitize_short`] strips postal codes and administrative segments
//!   and keeps the short street + locality form.
//! - [`apply_synonyms`] expands colloquial street names and widens bare
//!   `"<name> <number>"` queries with plausible street types.
//! - [`format_reverse_address`] turns raw reverse-geocode fields into a
//!   display label.
//!
//! The abbreviation, synonym, and administrative-token tables are data
//! files under `data/`, embedded at compile time (see [`tables`]).

pub mod reverse;
pub mod sanitize;
pub mod synonyms;
pub mod tables;

pub use reverse::{
    DEFAULT_LOCALITY, canonicalize_street_type, format_reverse_address,
    format_reverse_address_with,
};
pub use sanitize::{is_postal_code, sanitize_short};
pub use synonyms::apply_synonyms;

/// Splits normalized text into lowercase match tokens.
///
/// Tokens are split on whitespace and commas and deduplicated, keeping
/// first-occurrence order.
#[must_use]
pub fn tokenize(normalized: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in normalized
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}
