// ============================================================================
// Adaptive Rescaler
//
// Maps the smoothed score onto a stable [-2, 2] scale using winsorized
// bounds from its own trailing history:
//
//   window = most recent min(RESCALE_WINDOW, available) smoothed scores
//   lo     = quantile(window, winsor_lower)
//   hi     = quantile(window, winsor_upper)
//   out    = clip(-2 + 4 * (clip(s, lo, hi) - lo) / (hi - lo), -2, 2)
//
// Quantiles use linear interpolation between order statistics. The bounds
// adapt to each symbol's recent regime, so a score of +2 always means
// "at the top of this symbol's own recent range".
// ============================================================================

/// Trailing history length the winsor bounds are computed over.
pub const RESCALE_WINDOW: usize = 252;

/// Bound of the rescaled score.
pub const RESCALED_BOUND: f64 = 2.0;

/// Rescale the newest smoothed score against its trailing history.
///
/// `history` must be ordered oldest to newest and include the value being
/// rescaled as its last element.
///
/// # Edge cases
/// - Empty history -> `0.0`.
/// - Fewer than `RESCALE_WINDOW` observations -> bounds from all of them.
/// - Collapsed bounds (`hi == lo`, e.g. constant history) -> `0.0`.
pub fn rescale_latest(history: &[f64], winsor_lower: f64, winsor_upper: f64) -> f64 {
    let Some(&latest) = history.last() else {
        return 0.0;
    };

    let window_start = history.len().saturating_sub(RESCALE_WINDOW);
    let window = &history[window_start..];

    let mut sorted = window.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let lower_bound = quantile(&sorted, winsor_lower);
    let upper_bound = quantile(&sorted, winsor_upper);

    if upper_bound == lower_bound || !(upper_bound - lower_bound).is_finite() {
        return 0.0;
    }

    let winsorized = latest.clamp(lower_bound, upper_bound);
    let rescaled = -RESCALED_BOUND
        + 2.0 * RESCALED_BOUND * (winsorized - lower_bound) / (upper_bound - lower_bound);
    rescaled.clamp(-RESCALED_BOUND, RESCALED_BOUND)
}

/// Rescale every point of a smoothed series as the streaming engine would
/// have seen it, bounds recomputed from the history available at each step.
pub fn rescale_series(smoothed: &[f64], winsor_lower: f64, winsor_upper: f64) -> Vec<f64> {
    (0..smoothed.len())
        .map(|i| rescale_latest(&smoothed[..=i], winsor_lower, winsor_upper))
        .collect()
}

/// Linearly interpolated quantile of an ascending-sorted slice, fraction in
/// [0, 1]. NaN on empty input.
fn quantile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let position = (sorted.len() - 1) as f64 * fraction.clamp(0.0, 1.0);
    let index = position.floor() as usize;
    let fractional = position - index as f64;
    if index + 1 >= sorted.len() {
        return sorted[sorted.len() - 1];
    }
    sorted[index] + fractional * (sorted[index + 1] - sorted[index])
}
