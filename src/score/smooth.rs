// ============================================================================
// Half-Life Smoother
//
// Exponential moving average parameterized by half-life rather than span:
//
//   alpha = 1 - exp(ln(0.5) / half_life)
//   S_t   = alpha * raw_t + (1 - alpha) * S_{t-1},   S_0 = raw_0
//
// After exactly `half_life` steps with zero input, a unit impulse decays
// to one half. The recursion is O(1) per observation, so the engine keeps
// only the previous smoothed value per symbol.
// ============================================================================

/// Smoothing coefficient for a given half-life in observations.
///
/// # Edge cases
/// - Non-positive or non-finite half-life -> `1.0` (no memory, output
///   tracks raw input exactly).
pub fn half_life_alpha(half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 || !half_life_days.is_finite() {
        return 1.0;
    }
    1.0 - (-(2.0_f64.ln()) / half_life_days).exp()
}

/// One step of the EMA recursion. `previous` is `None` on the first
/// observation, which passes through unchanged.
pub fn smooth_next(previous: Option<f64>, raw: f64, alpha: f64) -> f64 {
    match previous {
        Some(prev) => alpha * raw + (1.0 - alpha) * prev,
        None => raw,
    }
}

/// Smooth a whole raw-score series. Convenience wrapper over the streaming
/// recursion for offline backfills.
pub fn smooth_series(raw: &[f64], half_life_days: f64) -> Vec<f64> {
    let alpha = half_life_alpha(half_life_days);
    let mut out = Vec::with_capacity(raw.len());
    let mut previous: Option<f64> = None;
    for &value in raw {
        let smoothed = smooth_next(previous, value, alpha);
        out.push(smoothed);
        previous = Some(smoothed);
    }
    out
}
