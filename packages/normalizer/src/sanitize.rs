//! Query sanitization.
//!
//! Address text pasted or typed by citizens often carries the full
//! provider display string: `"Avenida Providencia 1234, Providencia,
//! Región Metropolitana, 7500000, Chile"`. Providers match better on the
//! short street + locality form, so the noise segments are dropped here.

use std::collections::BTreeSet;

use crate::tables;

/// Maximum number of comma-separated segments kept by [`sanitize_short`].
pub const MAX_SEGMENTS: usize = 2;

/// Returns `true` for a purely numeric segment of three or more digits
/// (postal codes, not house numbers glued to a street).
#[must_use]
pub fn is_postal_code(segment: &str) -> bool {
    let segment = segment.trim();
    segment.chars().count() >= 3 && segment.chars().all(|c| c.is_ascii_digit())
}

/// Returns `true` if a segment should be dropped from a short address.
#[must_use]
pub fn is_noise_segment(segment: &str) -> bool {
    is_postal_code(segment) || tables::contains_admin_token(segment)
}

/// Collapses internal whitespace and trims.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortens free text to at most two meaningful comma-separated segments.
///
/// The pipeline:
/// 1. Split on commas and collapse whitespace in each segment
/// 2. Drop empty segments, postal codes, and administrative segments
/// 3. Deduplicate case-insensitively, keeping the first occurrence
/// 4. Keep the first [`MAX_SEGMENTS`] segments
#[must_use]
pub fn sanitize_short(raw: &str) -> String {
    let mut seen = BTreeSet::new();

    raw.split(',')
        .map(collapse_whitespace)
        .filter(|segment| !segment.is_empty() && !is_noise_segment(segment))
        .filter(|segment| seen.insert(segment.to_lowercase()))
        .take(MAX_SEGMENTS)
        .collect::<Vec<_>>()
        .join(", ")
}
