// =============================================================================
// Decay Model — half-life warmth scoring
// =============================================================================
//
// Formula:
//   raw   = BASE + amplitude * e^(-λ * days_elapsed)
//   score = round(raw) clamped to [0, 100]
//
// λ is derived from the contact's decay mode (ln 2 / half-life). BASE is the
// floor representing "neutral, no recent signal" — zero amplitude scores
// exactly BASE at any age.
//
// The function reads no clock and mutates nothing: callers pass elapsed days
// explicitly, which is what makes recompute-on-read ("pull to refresh") safe
// to call any number of times.
// =============================================================================

use crate::types::DecayMode;

/// Score floor for a contact with no accumulated signal.
pub const BASE_SCORE: f64 = 30.0;

/// Compute the present-moment warmth score for a contact.
///
/// `amplitude` is the stored interaction energy (≥ 0), `days_elapsed` the time
/// since it was last anchored. Negative elapsed values (clock skew, events
/// timestamped slightly ahead) are treated as zero rather than amplifying.
pub fn score(amplitude: f64, days_elapsed: f64, mode: DecayMode) -> u8 {
    let amplitude = amplitude.max(0.0);
    let days = days_elapsed.max(0.0);

    let decayed = amplitude * (-mode.lambda() * days).exp();
    let raw = BASE_SCORE + decayed;

    raw.round().clamp(0.0, 100.0) as u8
}

/// Days until a contact's score decays down to `threshold`, assuming no
/// further interactions.
///
/// Solves `BASE + amplitude_now * e^(-λd) = threshold` for `d`. Returns:
/// - `Some(0.0)` when the score is already at or below the threshold;
/// - `None` when the threshold is at or below [`BASE_SCORE`] — the curve
///   never reaches it, so there is no meaningful countdown.
pub fn days_until_threshold(amplitude_now: f64, threshold: u8, mode: DecayMode) -> Option<f64> {
    let target = threshold as f64 - BASE_SCORE;
    if target <= 0.0 {
        return None;
    }

    let amplitude_now = amplitude_now.max(0.0);
    if amplitude_now <= target {
        return Some(0.0);
    }

    Some((amplitude_now / target).ln() / mode.lambda())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amplitude_scores_base_at_any_age() {
        for mode in DecayMode::ALL {
            for days in [0.0, 1.0, 7.5, 100.0, 10_000.0] {
                assert_eq!(score(0.0, days, mode), 30, "mode {mode}, days {days}");
            }
        }
    }

    #[test]
    fn fresh_meeting_amplitude_scores_39() {
        // amplitude 9 (one meeting), no elapsed time: 30 + 9 = 39.
        assert_eq!(score(9.0, 0.0, DecayMode::Medium), 39);
    }

    #[test]
    fn meeting_fully_decays_back_to_base() {
        // amplitude 9 after 50 days under medium mode has decayed to ~0.12,
        // which rounds back down to the base score.
        assert_eq!(score(9.0, 50.0, DecayMode::Medium), 30);
    }

    #[test]
    fn half_life_halves_amplitude() {
        // amplitude 50 at the medium half-life (8 days): 30 + 25 = 55.
        assert_eq!(score(50.0, 8.0, DecayMode::Medium), 55);
    }

    #[test]
    fn score_is_bounded() {
        assert_eq!(score(100.0, 0.0, DecayMode::Medium), 100);
        assert_eq!(score(100.0, 1e6, DecayMode::Fast), 30);
        // Oversized amplitude input still clamps at the ceiling.
        assert_eq!(score(1e9, 0.0, DecayMode::Slow), 100);
    }

    #[test]
    fn monotone_non_increasing_in_elapsed_days() {
        for mode in DecayMode::ALL {
            let mut prev = score(80.0, 0.0, mode);
            for d in 1..200 {
                let s = score(80.0, d as f64, mode);
                assert!(s <= prev, "mode {mode}: score rose at day {d} ({prev} -> {s})");
                prev = s;
            }
        }
    }

    #[test]
    fn faster_modes_decay_at_least_as_hard() {
        for days in [0.5, 2.0, 5.0, 10.0, 30.0] {
            let fast = score(70.0, days, DecayMode::Fast);
            let medium = score(70.0, days, DecayMode::Medium);
            let slow = score(70.0, days, DecayMode::Slow);
            assert!(fast <= medium, "day {days}: fast {fast} > medium {medium}");
            assert!(medium <= slow, "day {days}: medium {medium} > slow {slow}");
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let first = score(42.0, 3.25, DecayMode::Fast);
        for _ in 0..10 {
            assert_eq!(score(42.0, 3.25, DecayMode::Fast), first);
        }
    }

    #[test]
    fn negative_elapsed_treated_as_zero() {
        assert_eq!(
            score(50.0, -3.0, DecayMode::Medium),
            score(50.0, 0.0, DecayMode::Medium)
        );
    }

    #[test]
    fn days_until_threshold_below_base_is_none() {
        assert!(days_until_threshold(80.0, 30, DecayMode::Medium).is_none());
        assert!(days_until_threshold(80.0, 0, DecayMode::Medium).is_none());
    }

    #[test]
    fn days_until_threshold_already_passed_is_zero() {
        let d = days_until_threshold(5.0, 40, DecayMode::Medium).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn days_until_threshold_matches_decay_curve() {
        // Starting at amplitude 50, find when the score reaches 40
        // (i.e. amplitude decays to 10), then verify against score().
        let d = days_until_threshold(50.0, 40, DecayMode::Medium).unwrap();
        assert!(d > 0.0);
        assert_eq!(score(50.0, d, DecayMode::Medium), 40);
        // Comfortably before the countdown the score is still above it.
        assert!(score(50.0, d - 2.0, DecayMode::Medium) > 40);
    }
}
