// ============================================================================
// Institutional Holdings Change (Z_H)
//
// Standardizes the most recent quarterly change in institutional ownership
// against its own trailing history:
//
//   pct_change[q] = (held[q] - held[q-1]) / held[q-1]
//   Z_H           = (pct_change[latest] - mean(window)) / sample_std(window)
//
// where the window is the changes belonging to the last HOLDINGS_Z_WINDOW
// filings. Filings arrive quarterly and late, so the signal also carries a
// staleness verdict: when the newest filing is older than `staleness_days`
// relative to the evaluation date the value is withheld entirely.
// ============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of filings whose changes form the standardization window.
pub const HOLDINGS_Z_WINDOW: usize = 12;

/// One institutional ownership filing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldingsObservation {
    /// Quarter-end date the filing reports on.
    pub quarter_end: NaiveDate,
    /// Percent of float held by institutions at that quarter end.
    pub pct_held: f64,
}

/// Outcome of the holdings computation for one symbol.
///
/// `z_h` is `None` whenever the input cannot support a standardized change
/// (too few filings, stale latest filing, degenerate recent change). The
/// staleness flag is reported independently so callers can log why a
/// component went missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HoldingsSignal {
    pub z_h: Option<f64>,
    pub is_stale: bool,
}

/// Standardized quarterly holdings change as of `as_of`.
///
/// Observations may arrive in any order; they are sorted by quarter end
/// before differencing.
///
/// # Edge cases
/// - Empty input -> `z_h: None`, not stale.
/// - Latest filing older than `staleness_days` -> `z_h: None`, stale.
/// - Fewer than two filings -> `z_h: None` (no change to standardize).
/// - Non-finite recent change (zero prior holding) -> `z_h: None`.
/// - Zero or undefined dispersion in the window -> `z_h: Some(0.0)`.
pub fn holdings_z_score(
    observations: &[HoldingsObservation],
    as_of: NaiveDate,
    staleness_days: i64,
) -> HoldingsSignal {
    if observations.is_empty() {
        return HoldingsSignal::default();
    }

    let mut sorted = observations.to_vec();
    sorted.sort_by_key(|obs| obs.quarter_end);

    let latest = sorted[sorted.len() - 1].quarter_end;
    let is_stale = as_of.signed_duration_since(latest).num_days() > staleness_days;
    if is_stale || sorted.len() < 2 {
        return HoldingsSignal { z_h: None, is_stale };
    }

    // --- Quarter-over-quarter percent changes ---
    let changes: Vec<f64> = sorted
        .windows(2)
        .map(|pair| (pair[1].pct_held - pair[0].pct_held) / pair[0].pct_held)
        .collect();

    let recent = changes[changes.len() - 1];
    if !recent.is_finite() {
        return HoldingsSignal { z_h: None, is_stale };
    }

    // --- Standardize against the trailing window ---
    let window_start = changes.len().saturating_sub(HOLDINGS_Z_WINDOW);
    let window = &changes[window_start..];

    let mean = mean(window);
    let std = sample_std(window, mean);
    if std == 0.0 || !std.is_finite() {
        return HoldingsSignal { z_h: Some(0.0), is_stale };
    }

    let z_h = (recent - mean) / std;
    if !z_h.is_finite() {
        return HoldingsSignal { z_h: Some(0.0), is_stale };
    }

    HoldingsSignal { z_h: Some(z_h), is_stale }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). NaN for a single observation.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let var = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    var.sqrt()
}
