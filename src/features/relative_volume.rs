// =============================================================================
// Relative Volume (RV) z-score
// =============================================================================
//
// Standardises recent trading volume against its historical baseline:
//
//   RV = (mean(vol, short) - mean(vol, long)) / std(vol, long)
//
// A positive RV means the last few sessions traded heavier than the trailing
// baseline, which is the footprint this overlay is hunting for.  The standard
// deviation is the sample (n - 1) form.

/// Compute the relative-volume z-score over the given volume series.
///
/// `volumes` must be time-ordered (oldest first).  The default windows are
/// short = 5 and long = 100 sessions.
///
/// Returns `Some(0.0)` when the long-window standard deviation is zero or
/// non-finite (constant volume), and `None` when:
/// - Either window is zero, or `short_window > long_window`.
/// - Fewer than `long_window` observations exist.
pub fn relative_volume(volumes: &[f64], short_window: usize, long_window: usize) -> Option<f64> {
    if short_window == 0 || long_window == 0 || short_window > long_window {
        return None;
    }
    if volumes.len() < long_window {
        return None;
    }

    let long_slice = &volumes[volumes.len() - long_window..];
    let short_slice = &volumes[volumes.len() - short_window..];

    let short_mean = mean(short_slice);
    let long_mean = mean(long_slice);
    let long_std = sample_std(long_slice, long_mean);

    if long_std == 0.0 || !long_std.is_finite() {
        return Some(0.0);
    }

    let rv = (short_mean - long_mean) / long_std;
    if rv.is_finite() {
        Some(rv)
    } else {
        Some(0.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). Returns NaN for a single element,
/// which callers treat as degenerate.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() as f64 - 1.0)).sqrt()
}
