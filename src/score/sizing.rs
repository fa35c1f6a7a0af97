// ============================================================================
// Kelly Sizing Overlay
//
//   k_adj = clip(k_base * (1 + beta * score), 0, k_max)
//
// A multiplicative tilt on the externally supplied base fraction. The floor
// at zero means the overlay can take sizing to cash but never short; the
// cap enforces the portfolio-level risk ceiling regardless of conviction.
// ============================================================================

/// Tilt `kelly_base` by the overlay score.
pub fn adjust_kelly_fraction(kelly_base: f64, score: f64, beta: f64, k_max: f64) -> f64 {
    (kelly_base * (1.0 + beta * score)).clamp(0.0, k_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_guardrails_hold_across_score_range() {
        // k_base 0.20, beta 0.5, cap 0.25.
        for score in [-2.0, -1.0, 0.0, 1.0, 2.0] {
            let k = adjust_kelly_fraction(0.20, score, 0.5, 0.25);
            assert!(
                (0.0..=0.25).contains(&k),
                "fraction escaped guardrails at score {score}: {k}"
            );
        }
    }

    #[test]
    fn sizing_tilt_values() {
        assert_eq!(adjust_kelly_fraction(0.20, -2.0, 0.5, 0.25), 0.0);
        assert_eq!(adjust_kelly_fraction(0.20, -1.0, 0.5, 0.25), 0.1);
        assert_eq!(adjust_kelly_fraction(0.20, 0.0, 0.5, 0.25), 0.2);
        assert_eq!(adjust_kelly_fraction(0.20, 1.0, 0.5, 0.25), 0.25);
        assert_eq!(adjust_kelly_fraction(0.20, 2.0, 0.5, 0.25), 0.25);
    }

    #[test]
    fn sizing_never_negative() {
        assert_eq!(adjust_kelly_fraction(0.20, -10.0, 0.5, 0.25), 0.0);
        assert_eq!(adjust_kelly_fraction(-0.05, 1.0, 0.5, 0.25), 0.0);
    }

    #[test]
    fn sizing_zero_beta_passes_base_through() {
        assert_eq!(adjust_kelly_fraction(0.18, 2.0, 0.0, 0.25), 0.18);
        // The cap still applies to an oversized base.
        assert_eq!(adjust_kelly_fraction(0.40, 2.0, 0.0, 0.25), 0.25);
    }

    #[test]
    fn sizing_monotone_in_score() {
        let low = adjust_kelly_fraction(0.10, -0.5, 0.5, 0.25);
        let mid = adjust_kelly_fraction(0.10, 0.0, 0.5, 0.25);
        let high = adjust_kelly_fraction(0.10, 0.5, 0.5, 0.25);
        assert!(low < mid && mid < high);
    }
}
