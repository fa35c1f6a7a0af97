// ============================================================================
// Decision Layer — band classifier and auditable decision records
// ============================================================================
//
// Maps the rescaled score and adjusted bull probability onto a position
// action. Probability overrides outrank the score bands.
//
// Rule hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. EXIT      — p_adj < exit_force            (probability floor)
//   2. INCREASE  — p_adj > inc_allow AND s >= 0  (probability override)
//   3. INCREASE  — s > increase band
//   4. MAINTAIN  — s >= maintain band
//   5. REDUCE    — s >= exit band
//   6. EXIT      — everything below
//
// Every evaluation produces a `DecisionRecord` so the verdict, the inputs
// it was computed from, and which components were actually fused can be
// audited after the fact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{BullProbabilityThresholds, DecisionBands};
use crate::types::{ComponentFlags, FeatureSnapshot};

// ============================================================================
// Types
// ============================================================================

/// Position action recommended by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Add to the position.
    Increase,
    /// Hold the current position.
    Maintain,
    /// Trim the position.
    Reduce,
    /// Close the position entirely.
    Exit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increase => "Increase",
            Self::Maintain => "Maintain",
            Self::Reduce => "Reduce",
            Self::Exit => "Exit",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Complete auditable record of one overlay evaluation.
///
/// All fields are populated at creation time by the engine; `id` and
/// `created_at` stamp the record for downstream log correlation.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    /// Unique identifier for this evaluation (UUID v4).
    pub id: String,

    /// Symbol the decision pertains to.
    pub symbol: String,

    /// Evaluation date the inputs were observed on.
    pub as_of: NaiveDate,

    /// Recommended position action.
    pub action: Action,

    /// Which classifier rule fired.
    pub reason: String,

    /// Raw fused composite, before smoothing.
    pub score_raw: f64,

    /// Half-life smoothed composite.
    pub score_smoothed: f64,

    /// Rescaled score in [-2, 2]; the value the action was derived from.
    pub score: f64,

    /// Bull probability as supplied by the external regime model.
    pub p_bull_raw: f64,

    /// Bull probability after the logit-space overlay shift.
    pub p_bull_adjusted: f64,

    /// Base Kelly fraction as supplied.
    pub kelly_base: f64,

    /// Kelly fraction after the overlay tilt and guardrails.
    pub kelly_adjusted: f64,

    /// Which components were present and fused for this evaluation.
    pub components: ComponentFlags,

    /// Human-readable component summary.
    pub notes: String,

    /// ISO 8601 timestamp of when this record was created.
    pub created_at: String,
}

// ============================================================================
// Classification logic
// ============================================================================

/// Determine the action and the rule that produced it.
pub fn classify(
    score: f64,
    p_adjusted: f64,
    bands: &DecisionBands,
    thresholds: &BullProbabilityThresholds,
) -> (Action, &'static str) {
    // 1. Probability floor — overrides everything, including a bullish score.
    if p_adjusted < thresholds.exit_force {
        return (Action::Exit, "bull probability below force-exit floor");
    }

    // 2. Probability override — strong regime plus a non-negative score.
    if p_adjusted > thresholds.inc_allow && score >= 0.0 {
        return (Action::Increase, "bull probability above increase threshold");
    }

    // 3-6. Score bands, highest first.
    if score > bands.increase {
        return (Action::Increase, "score above increase band");
    }
    if score >= bands.maintain {
        return (Action::Maintain, "score inside maintain band");
    }
    if score >= bands.exit {
        return (Action::Reduce, "score inside reduce band");
    }
    (Action::Exit, "score below exit band")
}

/// Component summary for the decision record.
///
/// Present components are printed with two decimals; the slow-moving
/// components (`Z_H`, `Z_DTC`) are always listed so their absence is
/// visible, the bar-derived ones are simply omitted when missing.
pub fn format_notes(features: &FeatureSnapshot, flags: &ComponentFlags) -> String {
    let mut notes: Vec<String> = Vec::new();

    if flags.has_rv {
        notes.push(format!("RV z={:.2}", features.rv.unwrap_or(0.0)));
    }
    if flags.has_ad_slope {
        notes.push(format!("AD_slope={:.2}", features.ad_slope.unwrap_or(0.0)));
    }
    if flags.has_z_h {
        notes.push(format!("Z_H={:.2}", features.z_h.unwrap_or(0.0)));
    } else {
        notes.push("Z_H n/a".to_string());
    }
    if flags.has_z_dtc {
        notes.push(format!("Z_DTC={:.2}", features.z_dtc.unwrap_or(0.0)));
    } else {
        notes.push("Z_DTC n/a".to_string());
    }

    notes.join("; ")
}

// ============================================================================
// Unit Tests
// ============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> DecisionBands {
        DecisionBands {
            increase: 1.0,
            maintain: 0.0,
            exit: -1.0,
        }
    }

    fn thresholds() -> BullProbabilityThresholds {
        BullProbabilityThresholds {
            exit_force: 0.40,
            inc_allow: 0.80,
        }
    }

    fn action_for(score: f64, p_adjusted: f64) -> Action {
        classify(score, p_adjusted, &bands(), &thresholds()).0
    }

    #[test]
    fn classify_score_bands() {
        assert_eq!(action_for(1.5, 0.65), Action::Increase);
        assert_eq!(action_for(0.5, 0.65), Action::Maintain);
        assert_eq!(action_for(-0.5, 0.65), Action::Reduce);
        assert_eq!(action_for(-1.5, 0.65), Action::Exit);
    }

    #[test]
    fn classify_force_exit_outranks_bullish_score() {
        assert_eq!(action_for(1.0, 0.30), Action::Exit);
        assert_eq!(action_for(2.0, 0.39), Action::Exit);
    }

    #[test]
    fn classify_probability_override_lifts_modest_score() {
        assert_eq!(action_for(0.5, 0.85), Action::Increase);
    }

    #[test]
    fn classify_probability_override_requires_nonnegative_score() {
        // High probability alone must not add into a deteriorating flow.
        assert_eq!(action_for(-0.5, 0.85), Action::Reduce);
        assert_eq!(action_for(0.0, 0.85), Action::Increase);
    }

    #[test]
    fn classify_band_boundaries() {
        // Bands are closed on the downside, open on the upside.
        assert_eq!(action_for(1.0, 0.65), Action::Maintain);
        assert_eq!(action_for(0.0, 0.65), Action::Maintain);
        assert_eq!(action_for(-1.0, 0.65), Action::Reduce);

        // Probability thresholds are strict.
        assert_eq!(action_for(0.5, 0.40), Action::Maintain);
        assert_eq!(action_for(0.5, 0.80), Action::Maintain);
    }

    #[test]
    fn classify_nan_score_exits() {
        assert_eq!(action_for(f64::NAN, 0.65), Action::Exit);
    }

    #[test]
    fn action_labels() {
        assert_eq!(format!("{}", Action::Increase), "Increase");
        assert_eq!(format!("{}", Action::Exit), "Exit");
        assert_eq!(Action::Reduce.as_str(), "Reduce");
    }

    #[test]
    fn notes_full_presence() {
        let features = FeatureSnapshot {
            z_h: Some(0.5),
            rv: Some(1.234),
            ad_slope: Some(-0.567),
            z_dtc: Some(0.1),
        };
        let flags = ComponentFlags {
            has_z_h: true,
            has_rv: true,
            has_ad_slope: true,
            has_z_dtc: true,
        };
        assert_eq!(
            format_notes(&features, &flags),
            "RV z=1.23; AD_slope=-0.57; Z_H=0.50; Z_DTC=0.10"
        );
    }

    #[test]
    fn notes_absent_components() {
        let features = FeatureSnapshot {
            z_h: Some(0.5),
            ..FeatureSnapshot::default()
        };
        let flags = ComponentFlags {
            has_z_h: true,
            ..ComponentFlags::default()
        };
        assert_eq!(format_notes(&features, &flags), "Z_H=0.50; Z_DTC n/a");

        assert_eq!(
            format_notes(&FeatureSnapshot::default(), &ComponentFlags::default()),
            "Z_H n/a; Z_DTC n/a"
        );
    }

    #[test]
    fn record_serializes_action_label() {
        let record = DecisionRecord {
            id: "test".to_string(),
            symbol: "AAPL".to_string(),
            as_of: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            action: Action::Increase,
            reason: "score above increase band".to_string(),
            score_raw: 1.4,
            score_smoothed: 1.2,
            score: 1.3,
            p_bull_raw: 0.65,
            p_bull_adjusted: 0.82,
            kelly_base: 0.20,
            kelly_adjusted: 0.25,
            components: ComponentFlags::default(),
            notes: "Z_H n/a; Z_DTC n/a".to_string(),
            created_at: "2024-03-01T00:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"], "Increase");
        assert_eq!(value["as_of"], "2024-03-01");
        assert_eq!(value["components"]["has_rv"], false);
    }
}
