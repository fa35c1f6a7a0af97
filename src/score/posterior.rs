// ============================================================================
// Bull-Probability Adjustment
//
// Shifts an externally supplied bull probability in logit space by the
// overlay score:
//
//   logit' = logit(clip(p, eps, 1 - eps)) + gamma * score
//   p_adj  = sigmoid(logit')
//
// Working in logit space keeps the adjustment symmetric around p = 0.5 and
// guarantees the output stays a probability for any finite score.
// ============================================================================

/// Clamp margin keeping the logit finite at the probability edges.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Adjust `p_bull` by `gamma * score` in logit space.
///
/// Strictly increasing in `score` for `gamma > 0`; `score == 0.0` returns
/// `p_bull` (up to the epsilon clamp). Out-of-range finite inputs are
/// clamped into the open unit interval before the transform.
pub fn adjust_bull_probability(p_bull: f64, score: f64, gamma: f64) -> f64 {
    let clipped = p_bull.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
    let logit = (clipped / (1.0 - clipped)).ln();
    let shifted = logit + gamma * score;
    let adjusted = 1.0 / (1.0 + (-shifted).exp());
    adjusted.clamp(0.0, 1.0)
}
