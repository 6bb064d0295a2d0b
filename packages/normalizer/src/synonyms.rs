//! Synonym and street-type expansion for forward search.
//!
//! Citizens type the names people actually use ("Alameda 1500",
//! "Vespucio 1200") while providers index canonical names ("Avenida
//! Libertador Bernardo O'Higgins"). [`apply_synonyms`] produces every
//! variant worth sending, most literal first; providers decide how many of
//! them fit their request budget.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::tables;

/// A bare `"<name> <number>"` segment: letters/spaces followed by a house
/// number with an optional letter suffix.
static BARE_NAME_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[^\d,]*[^\d\s,][^\d,]*?)\s+(?P<number>\d+[A-Za-z]?)$")
        .expect("valid regex")
});

/// Expands a query into all variants worth sending to a provider.
///
/// The original query always comes first. Then, in order:
/// 1. One variant per colloquial name found in the query, with the name
///    replaced by its canonical form (skipped when the canonical form is
///    already present)
/// 2. When the first segment is a bare `"<name> <number>"` with no
///    street-type word, one variant per plausible street type
///    (`"Avenida …"`, `"Calle …"`, `"Pasaje …"`, `"Camino …"`)
///
/// Variants are deduplicated case-insensitively.
#[must_use]
pub fn apply_synonyms(query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let mut variants = vec![query.to_string()];
    let lowered = query.to_lowercase();

    for (re, synonym) in tables::SYNONYMS.iter() {
        if lowered.contains(&synonym.canonical.to_lowercase()) {
            continue;
        }
        if re.is_match(query) {
            let expanded = re.replace_all(query, synonym.canonical.as_str());
            variants.push(expanded.into_owned());
        }
    }

    variants.extend(street_type_variants(query));

    let mut seen = BTreeSet::new();
    variants.retain(|v| seen.insert(v.to_lowercase()));
    variants
}

/// Prefixes a bare `"<name> <number>"` first segment with each variant
/// street type. Returns nothing when the segment already names a type.
fn street_type_variants(query: &str) -> Vec<String> {
    let (head, tail) = query.split_once(',').unwrap_or((query, ""));
    let head = head.trim();

    let Some(caps) = BARE_NAME_NUMBER_RE.captures(head) else {
        return Vec::new();
    };

    if caps["name"].split_whitespace().any(tables::is_street_type) {
        return Vec::new();
    }

    let suffix = if tail.trim().is_empty() {
        String::new()
    } else {
        format!(", {}", tail.trim())
    };

    tables::variant_street_types()
        .map(|street_type| format!("{street_type} {head}{suffix}"))
        .collect()
}
