//! Reverse-geocode formatting.
//!
//! Reverse geocoders disagree on where the house number lives: some put it
//! in `name` (`{street: "Américo Vespucio", name: "1200"}`), some in an
//! explicit number field, and some glue it to the street
//! (`"Américo Vespucio 1200"`). All three shapes format to the same short
//! label: `"<street> <number>, <locality>"`.

use std::sync::LazyLock;

use locator_geocoder_models::Placemark;
use regex::Regex;

use crate::sanitize::{collapse_whitespace, is_noise_segment, is_postal_code};
use crate::tables;

/// Locality appended when the placemark carries none.
pub const DEFAULT_LOCALITY: &str = "Santiago";

/// A house number with an optional letter suffix.
static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[A-Za-z]?$").expect("valid regex"));

/// A street followed by a trailing house number.
static TRAILING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<street>.*\S)\s+(?P<number>\d+[A-Za-z]?)$").expect("valid regex")
});

/// The first word of a street and whatever follows it. The word may be
/// closed by a period with no space (`"Av.Providencia"`).
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[^\s.]+)(?:\.\s*|\s+)(?P<rest>\S.*)$").expect("valid regex")
});

/// Replaces an abbreviated street-type prefix with the full word.
///
/// `"Av. Providencia"` → `"Avenida Providencia"`. Streets without a known
/// prefix are returned with whitespace collapsed and otherwise unchanged.
#[must_use]
pub fn canonicalize_street_type(street: &str) -> String {
    let street = collapse_whitespace(street);
    let Some(caps) = PREFIX_RE.captures(&street) else {
        return street;
    };

    tables::street_type_for(&caps["prefix"]).map_or_else(
        || street.clone(),
        |canonical| format!("{canonical} {}", &caps["rest"]),
    )
}

/// Formats a placemark as `"<street> <number>, <locality>"` using
/// [`DEFAULT_LOCALITY`] when no locality is present.
#[must_use]
pub fn format_reverse_address(placemark: &Placemark) -> String {
    format_reverse_address_with(placemark, DEFAULT_LOCALITY)
}

/// Formats a placemark with an explicit fallback locality.
///
/// Postal code, province, region, and country never appear in the output.
#[must_use]
pub fn format_reverse_address_with(placemark: &Placemark, fallback_locality: &str) -> String {
    let locality = locality(placemark).unwrap_or_else(|| collapse_whitespace(fallback_locality));

    let line = match street_and_number(placemark) {
        (Some(street), Some(number)) => Some(format!("{street} {number}")),
        (Some(street), None) => Some(street),
        (None, _) => None,
    };

    match line {
        Some(line) if !line.eq_ignore_ascii_case(&locality) => format!("{line}, {locality}"),
        _ => locality,
    }
}

fn clean(field: Option<&String>) -> Option<String> {
    field
        .map(|v| collapse_whitespace(v))
        .filter(|v| !v.is_empty())
}

fn is_house_number(value: &str) -> bool {
    HOUSE_NUMBER_RE.is_match(value)
}

/// Derives the street name and house number from the raw fields.
fn street_and_number(placemark: &Placemark) -> (Option<String>, Option<String>) {
    let name = clean(placemark.name.as_ref());
    let street_field = clean(placemark.street.as_ref()).filter(|s| !is_postal_code(s));

    let mut number = clean(placemark.street_number.as_ref())
        .filter(|n| is_house_number(n))
        .or_else(|| name.clone().filter(|n| is_house_number(n)));

    // With no street field, a non-numeric name is the best street we have.
    let mut street = street_field
        .clone()
        .or_else(|| name.clone().filter(|n| !is_house_number(n)));

    if let Some(current) = street.clone()
        && let Some(caps) = TRAILING_NUMBER_RE.captures(&current)
    {
        let suffix = &caps["number"];
        if number.as_deref().is_none_or(|n| n == suffix) {
            number = Some(suffix.to_string());
            street = Some(caps["street"].to_string());
        }
    }

    // Some geocoders report `name` as the full "<street> <number>".
    if number.is_none()
        && let (Some(current), Some(name)) = (street.as_deref(), name.as_deref())
        && let Some(caps) = TRAILING_NUMBER_RE.captures(name)
        && caps["street"].eq_ignore_ascii_case(current)
    {
        number = Some(caps["number"].to_string());
    }

    (street.map(|s| canonicalize_street_type(&s)), number)
}

/// Picks the first usable locality: city, then district, then subregion.
fn locality(placemark: &Placemark) -> Option<String> {
    [
        placemark.city.as_ref(),
        placemark.district.as_ref(),
        placemark.subregion.as_ref(),
    ]
    .into_iter()
    .filter_map(clean)
    .map(|value| {
        value
            .split_whitespace()
            .filter(|word| !is_postal_code(word))
            .collect::<Vec<_>>()
            .join(" ")
    })
    .find(|value| !value.is_empty() && !is_noise_segment(value))
}
