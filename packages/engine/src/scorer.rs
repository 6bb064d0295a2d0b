//! Candidate ranking.
//!
//! A candidate's total score is its text score plus its proximity score.
//! Text score rewards labels that contain the query's tokens; proximity
//! score rewards candidates near the reference point (the device's current
//! position or the map center).

use std::cmp::Ordering;

use locator_geocoder_models::{Candidate, CandidateSource, Coordinates};

/// Points awarded per query token found in the label.
pub const TOKEN_MATCH_POINTS: f64 = 3.0;

/// Proximity score at zero distance.
pub const PROXIMITY_MAX: f64 = 2.5;

/// Proximity points lost per degree of Manhattan distance. The boost
/// reaches zero at 0.05°.
pub const PROXIMITY_DECAY_PER_DEGREE: f64 = 50.0;

/// Which candidates get rescored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoringPolicy {
    /// Only fallback candidates are scored; primary candidates keep the
    /// provider's order.
    #[default]
    FallbackOnly,
    /// Every candidate is scored.
    All,
}

impl ScoringPolicy {
    /// Returns `true` if candidates from `source` are rescored.
    #[must_use]
    pub const fn rescores(self, source: CandidateSource) -> bool {
        match self {
            Self::All => true,
            Self::FallbackOnly => matches!(source, CandidateSource::Fallback),
        }
    }
}

/// `+3` for every token that appears (case-insensitively) in `label`.
#[must_use]
pub fn text_score(tokens: &[String], label: &str) -> f64 {
    let label = label.to_lowercase();
    let matches = tokens
        .iter()
        .filter(|token| !token.is_empty() && label.contains(token.to_lowercase().as_str()))
        .count();

    #[allow(clippy::cast_precision_loss)]
    let matches = matches as f64;
    matches * TOKEN_MATCH_POINTS
}

/// `max(0, 2.5 - 50 * manhattan_distance)`, or zero when either point is
/// unknown.
#[must_use]
pub fn proximity_score(reference: Option<Coordinates>, candidate: Option<Coordinates>) -> f64 {
    match (reference, candidate) {
        (Some(reference), Some(candidate)) => (PROXIMITY_MAX
            - PROXIMITY_DECAY_PER_DEGREE * reference.manhattan_degrees(candidate))
        .max(0.0),
        _ => 0.0,
    }
}

/// Total score of one candidate.
#[must_use]
pub fn score(candidate: &Candidate, tokens: &[String], reference: Option<Coordinates>) -> f64 {
    text_score(tokens, &candidate.label) + proximity_score(reference, candidate.coordinates)
}

/// Scores candidates per `policy` and sorts them best-first.
///
/// The sort is stable: ties keep source priority, then provider order.
/// Unscored candidates sort after scored ones, in provider order.
#[must_use]
pub fn rank(
    candidates: Vec<Candidate>,
    tokens: &[String],
    reference: Option<Coordinates>,
    policy: ScoringPolicy,
) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .map(|mut candidate| {
            if policy.rescores(candidate.source) {
                candidate.score = Some(score(&candidate, tokens, reference));
            }
            candidate
        })
        .collect();

    if ranked.iter().all(|c| c.score.is_none()) {
        return ranked;
    }

    ranked.sort_by(compare);
    ranked
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.source.priority().cmp(&b.source.priority()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn text_score_counts_matching_tokens() {
        let t = tokens(&["providencia", "1234"]);
        assert!((text_score(&t, "Avenida Providencia 1234") - 6.0).abs() < f64::EPSILON);
        assert!((text_score(&t, "PROVIDENCIA") - 3.0).abs() < f64::EPSILON);
        assert!(text_score(&t, "Las Condes").abs() < f64::EPSILON);
    }

    #[test]
    fn proximity_decays_to_zero() {
        let p = Coordinates::new(-33.45, -70.66);
        assert!((proximity_score(Some(p), Some(p)) - PROXIMITY_MAX).abs() < 1e-9);

        let near = Coordinates::new(-33.455, -70.66);
        assert!((proximity_score(Some(p), Some(near)) - 2.25).abs() < 1e-9);

        let far = Coordinates::new(-32.45, -70.66);
        assert!(proximity_score(Some(p), Some(far)).abs() < f64::EPSILON);

        assert!(proximity_score(None, Some(p)).abs() < f64::EPSILON);
        assert!(proximity_score(Some(p), None).abs() < f64::EPSILON);
    }

    #[test]
    fn nearby_candidate_outranks_distant_text_equal_one() {
        let reference = Coordinates::new(-33.45, -70.66);
        let candidates = vec![
            Candidate::fallback("Calle X 1234", Coordinates::new(-34.45, -70.66), 0.9),
            Candidate::fallback("Calle X 1234", Coordinates::new(-33.455, -70.665), 0.1),
        ];

        let ranked = rank(
            candidates,
            &tokens(&["x", "1234"]),
            Some(reference),
            ScoringPolicy::FallbackOnly,
        );

        assert_eq!(
            ranked[0].coordinates,
            Some(Coordinates::new(-33.455, -70.665))
        );
    }

    #[test]
    fn scores_are_non_increasing_and_ties_keep_order() {
        let c = Coordinates::new(0.0, 0.0);
        let candidates = vec![
            Candidate::fallback("Los Leones", c, 0.0),
            Candidate::fallback("Providencia 10", c, 0.0),
            Candidate::fallback("Calle Providencia", c, 0.0),
            Candidate::fallback("Providencia", c, 0.0),
        ];

        let ranked = rank(
            candidates,
            &tokens(&["providencia", "10"]),
            None,
            ScoringPolicy::FallbackOnly,
        );

        let scores: Vec<f64> = ranked.iter().filter_map(|c| c.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        let labels: Vec<&str> = ranked.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Providencia 10", "Calle Providencia", "Providencia", "Los Leones"]
        );
    }

    #[test]
    fn primary_candidates_keep_provider_order_by_default() {
        let candidates = vec![
            Candidate::primary("Los Leones", "a"),
            Candidate::primary("Providencia 10", "b"),
        ];

        let ranked = rank(
            candidates.clone(),
            &tokens(&["providencia"]),
            None,
            ScoringPolicy::FallbackOnly,
        );
        assert_eq!(ranked, candidates);
    }

    #[test]
    fn rescore_all_ranks_primary_candidates() {
        let candidates = vec![
            Candidate::primary("Los Leones", "a"),
            Candidate::primary("Providencia 10", "b"),
        ];

        let ranked = rank(
            candidates,
            &tokens(&["providencia"]),
            None,
            ScoringPolicy::All,
        );
        assert_eq!(ranked[0].label, "Providencia 10");
        assert!(ranked.iter().all(|c| c.score.is_some()));
    }
}
