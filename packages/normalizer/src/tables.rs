//! Compile-time embedded normalization tables.
//!
//! The street-type, synonym, and administrative-token tables live as TOML
//! under `data/` so they can be reviewed and extended without touching the
//! transform logic. They are parsed once on first use.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// A street-type word with its accepted abbreviations.
#[derive(Debug, Clone, Deserialize)]
pub struct StreetType {
    /// Full canonical word (e.g., `"Avenida"`).
    pub canonical: String,
    /// Lowercase abbreviations, including the canonical word itself.
    pub abbreviations: Vec<String>,
    /// Whether bare `"<name> <number>"` queries get a variant with this type.
    #[serde(default)]
    pub variant: bool,
}

/// A colloquial name and the canonical long form it stands for.
#[derive(Debug, Clone, Deserialize)]
pub struct Synonym {
    /// Phrase matched as whole words, case-insensitively.
    pub pattern: String,
    /// Canonical replacement.
    pub canonical: String,
}

#[derive(Deserialize)]
struct StreetTypeFile {
    street_type: Vec<StreetType>,
}

#[derive(Deserialize)]
struct SynonymFile {
    synonym: Vec<Synonym>,
}

#[derive(Deserialize)]
struct AdminTokenFile {
    tokens: Vec<String>,
}

const STREET_TYPES_TOML: &str = include_str!("../data/street_types.toml");
const SYNONYMS_TOML: &str = include_str!("../data/synonyms.toml");
const ADMIN_TOKENS_TOML: &str = include_str!("../data/admin_tokens.toml");

fn parse_embedded<T: for<'de> Deserialize<'de>>(name: &str, toml_str: &str) -> T {
    toml::de::from_str(toml_str)
        .unwrap_or_else(|e| panic!("Failed to parse normalizer table '{name}': {e}"))
}

/// All street types in file order.
///
/// # Panics
///
/// Panics on first use if the embedded TOML is malformed.
pub static STREET_TYPES: LazyLock<Vec<StreetType>> = LazyLock::new(|| {
    parse_embedded::<StreetTypeFile>("street_types", STREET_TYPES_TOML).street_type
});

/// Lowercase abbreviation → canonical street type.
static ABBREVIATIONS: LazyLock<BTreeMap<String, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    for street_type in STREET_TYPES.iter() {
        map.insert(
            street_type.canonical.to_lowercase(),
            street_type.canonical.as_str(),
        );
        for abbreviation in &street_type.abbreviations {
            map.insert(abbreviation.to_lowercase(), street_type.canonical.as_str());
        }
    }
    map
});

/// Synonyms paired with their compiled whole-phrase matcher.
pub static SYNONYMS: LazyLock<Vec<(Regex, Synonym)>> = LazyLock::new(|| {
    parse_embedded::<SynonymFile>("synonyms", SYNONYMS_TOML)
        .synonym
        .into_iter()
        .map(|synonym| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&synonym.pattern));
            let re = Regex::new(&pattern).unwrap_or_else(|e| {
                panic!("Invalid synonym pattern '{}': {e}", synonym.pattern)
            });
            (re, synonym)
        })
        .collect()
});

/// Lowercase administrative tokens (region, province, country words).
static ADMIN_TOKENS: LazyLock<Vec<String>> = LazyLock::new(|| {
    parse_embedded::<AdminTokenFile>("admin_tokens", ADMIN_TOKENS_TOML)
        .tokens
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect()
});

/// Looks up the canonical street type for a single token.
///
/// A trailing period is ignored, so `"Av."`, `"av"` and `"AVENIDA"` all
/// resolve to `"Avenida"`.
#[must_use]
pub fn street_type_for(token: &str) -> Option<&'static str> {
    let key = token.trim_end_matches('.').to_lowercase();
    ABBREVIATIONS.get(&key).copied()
}

/// Returns `true` if the token is a street-type word or abbreviation.
#[must_use]
pub fn is_street_type(token: &str) -> bool {
    street_type_for(token).is_some()
}

/// Returns `true` if any word of `segment` is an administrative token.
#[must_use]
pub fn contains_admin_token(segment: &str) -> bool {
    segment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            let word = word.to_lowercase();
            ADMIN_TOKENS.iter().any(|token| *token == word)
        })
}

/// Street types used to widen bare `"<name> <number>"` queries, in order.
pub fn variant_street_types() -> impl Iterator<Item = &'static str> {
    STREET_TYPES
        .iter()
        .filter(|t| t.variant)
        .map(|t| t.canonical.as_str())
}
