// =============================================================================
// Accumulation/Distribution (A/D) normalised slope
// =============================================================================
//
// Measures whether money flow is accumulating into or distributing out of a
// symbol over the trailing window:
//
//   MFM  = ((Close - Low) - (High - Close)) / max(High - Low, 1e-6)
//   MFV  = MFM * Volume
//   AD_t = cumulative sum of MFV over the trailing 120 bars
//
// The feature is the OLS slope of the last `lookback` points of the AD line,
// normalised by the scale-adjusted median absolute deviation of the full
// 120-bar line, clipped to [-clip, +clip].

use crate::types::Bar;

/// Number of trailing bars the accumulation line is built over.
pub const AD_WINDOW: usize = 120;

/// Floor for the High-Low range, guarding the High == Low degenerate bar.
const HL_EPSILON: f64 = 1e-6;

/// Consistency constant relating MAD to the standard deviation of a normal
/// distribution; the raw MAD is divided by this value.
const NORMAL_CONSISTENCY: f64 = 0.674_489_750_196_081_7;

/// Compute the normalised A/D slope over the trailing [`AD_WINDOW`] bars.
///
/// `bars` must be time-ordered (oldest first).  `lookback` is the number of
/// most-recent AD points the slope is fitted to (default 20), and `clip`
/// bounds the output symmetrically (default 2.0).
///
/// Returns `Some(0.0)` when the MAD of the AD line is zero or non-finite
/// (flat line), and `None` when:
/// - `lookback < 2` (a slope needs at least two points).
/// - Fewer than [`AD_WINDOW`] bars exist.
///
/// # Edge cases
/// - `High == Low` bars contribute MFM through the 1e-6 floor instead of
///   dividing by zero; an all-doji series yields a flat AD line and 0.0.
pub fn ad_slope(bars: &[Bar], lookback: usize, clip: f64) -> Option<f64> {
    if lookback < 2 || bars.len() < AD_WINDOW {
        return None;
    }

    let window = &bars[bars.len() - AD_WINDOW..];

    // --- Accumulation line: cumulative money-flow volume --------------------
    let mut ad_line = Vec::with_capacity(AD_WINDOW);
    let mut cumulative = 0.0;
    for bar in window {
        let hl_range = (bar.high - bar.low).max(HL_EPSILON);
        let mfm = ((bar.close - bar.low) - (bar.high - bar.close)) / hl_range;
        cumulative += mfm * bar.volume;
        ad_line.push(cumulative);
    }

    // --- OLS slope over the most recent lookback points ---------------------
    let tail_start = ad_line.len().saturating_sub(lookback);
    let slope = ols_slope(&ad_line[tail_start..]);

    // --- Normalise by the scale-adjusted MAD of the full line ---------------
    let mad = normal_mad(&ad_line);
    if mad == 0.0 || !mad.is_finite() {
        return Some(0.0);
    }

    let normalized = slope / mad;
    if !normalized.is_finite() {
        return Some(0.0);
    }

    Some(normalized.clamp(-clip, clip))
}

/// Ordinary-least-squares slope of `ys` against x = 0, 1, 2, ...
fn ols_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Median absolute deviation scaled for the normal distribution.
fn normal_mad(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations) / NORMAL_CONSISTENCY
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
