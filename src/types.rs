// =============================================================================
// Shared types used across the institutional flow overlay engine
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily OHLCV bar supplied by the external market-data layer.
///
/// Bars arrive time-ordered (oldest first) and are never mutated by the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Per-symbol, per-date feature snapshot fed into the fuser.
///
/// Each field is `None` when the extractor had insufficient history or the
/// external loader flagged the value as stale. Absence is a first-class
/// state, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    /// Institutional-holdings z-score (quarter-over-quarter ownership change).
    pub z_h: Option<f64>,
    /// Relative-volume z-score (recent vs. historical baseline).
    pub rv: Option<f64>,
    /// Normalised accumulation/distribution line slope.
    pub ad_slope: Option<f64>,
    /// Days-to-cover z-score (short interest). Absent until a short-interest
    /// feed is wired in.
    pub z_dtc: Option<f64>,
}

/// Which components actually participated in a fused score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFlags {
    pub has_z_h: bool,
    pub has_rv: bool,
    pub has_ad_slope: bool,
    pub has_z_dtc: bool,
}

impl ComponentFlags {
    /// Number of components that participated.
    pub fn active_count(&self) -> usize {
        usize::from(self.has_z_h)
            + usize::from(self.has_rv)
            + usize::from(self.has_ad_slope)
            + usize::from(self.has_z_dtc)
    }

    /// True when no component participated (the score is the neutral 0.0).
    pub fn none_active(&self) -> bool {
        self.active_count() == 0
    }
}

/// Externally supplied regime estimate for one symbol at one tick.
///
/// Produced by the probability/sizing estimator collaborator; the engine
/// only overlays it, it never computes these itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeEstimate {
    /// Raw bull-regime probability in (0, 1).
    pub p_bull_raw: f64,
    /// Base Kelly sizing fraction, >= 0.
    pub kelly_base: f64,
}
