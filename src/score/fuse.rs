// ============================================================================
// Component Fuser
//
// Weighted fusion of the institutional-flow components into one raw score:
//
//   active  = components that are present and finite
//   w'_i    = w_i / sum(w_j for j in active)
//   raw     = clip(sum(w'_i * x_i), -RAW_SCORE_BOUND, +RAW_SCORE_BOUND)
//
// Missing components never contribute and never drag the score toward zero;
// the surviving weights are renormalized so the score stays comparable as
// coverage changes. The returned flags record exactly which components were
// fused, for audit notes downstream.
// ============================================================================

use crate::config::ComponentWeights;
use crate::types::{ComponentFlags, FeatureSnapshot};

/// Hard bound on the raw composite score.
pub const RAW_SCORE_BOUND: f64 = 3.0;

/// Fuse the present components of `features` under `weights`.
///
/// # Edge cases
/// - `None` or non-finite component values are treated as missing.
/// - All components missing -> `(0.0, flags all false)`.
/// - Present components carry zero total weight -> `(0.0, flags as observed)`.
/// - Result outside the bound is clipped, never rejected.
pub fn fuse_components(
    features: &FeatureSnapshot,
    weights: &ComponentWeights,
) -> (f64, ComponentFlags) {
    let flags = ComponentFlags {
        has_z_h: present(features.z_h),
        has_rv: present(features.rv),
        has_ad_slope: present(features.ad_slope),
        has_z_dtc: present(features.z_dtc),
    };

    // --- Restrict the weight vector to present components ---
    let mut total_weight = 0.0;
    if flags.has_z_h {
        total_weight += weights.z_h;
    }
    if flags.has_rv {
        total_weight += weights.rv;
    }
    if flags.has_ad_slope {
        total_weight += weights.ad_slope;
    }
    if flags.has_z_dtc {
        total_weight += weights.z_dtc;
    }

    if total_weight == 0.0 {
        return (0.0, flags);
    }

    // --- Renormalize and combine, fixed component order ---
    let mut score = 0.0;
    score += contribution(features.z_h, weights.z_h, total_weight);
    score += contribution(features.rv, weights.rv, total_weight);
    score += contribution(features.ad_slope, weights.ad_slope, total_weight);
    score += contribution(features.z_dtc, weights.z_dtc, total_weight);

    (score.clamp(-RAW_SCORE_BOUND, RAW_SCORE_BOUND), flags)
}

fn present(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v.is_finite())
}

fn contribution(value: Option<f64>, weight: f64, total_weight: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => weight / total_weight * v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_weights() -> ComponentWeights {
        ComponentWeights {
            z_h: 0.0,
            rv: 0.60,
            ad_slope: 0.40,
            z_dtc: 0.0,
        }
    }

    fn equal_weights() -> ComponentWeights {
        ComponentWeights {
            z_h: 0.25,
            rv: 0.25,
            ad_slope: 0.25,
            z_dtc: 0.25,
        }
    }

    #[test]
    fn fuse_full_presence_is_weighted_mean() {
        let features = FeatureSnapshot {
            z_h: Some(2.0),
            rv: Some(1.0),
            ad_slope: Some(-1.0),
            z_dtc: Some(0.0),
        };
        let (score, flags) = fuse_components(&features, &equal_weights());
        assert!((score - 0.5).abs() < 1e-12, "expected 0.5, got {score}");
        assert_eq!(flags.active_count(), 4);
    }

    #[test]
    fn fuse_renormalizes_over_present_components() {
        let features = FeatureSnapshot {
            z_h: None,
            rv: Some(1.5),
            ad_slope: Some(0.8),
            z_dtc: None,
        };
        let (score, flags) = fuse_components(&features, &bar_weights());
        // 0.60 * 1.5 + 0.40 * 0.8 with weights already summing to one.
        assert!((score - 1.22).abs() < 0.01, "expected ~1.22, got {score}");
        assert!(flags.has_rv && flags.has_ad_slope);
        assert!(!flags.has_z_h && !flags.has_z_dtc);
    }

    #[test]
    fn fuse_single_component_passes_through() {
        let features = FeatureSnapshot {
            rv: Some(-0.7),
            ..FeatureSnapshot::default()
        };
        let (score, flags) = fuse_components(&features, &bar_weights());
        assert_eq!(score, -0.7);
        assert_eq!(flags.active_count(), 1);
    }

    #[test]
    fn fuse_all_missing_is_zero() {
        let (score, flags) = fuse_components(&FeatureSnapshot::default(), &bar_weights());
        assert_eq!(score, 0.0);
        assert!(flags.none_active());
    }

    #[test]
    fn fuse_nan_component_is_missing() {
        let features = FeatureSnapshot {
            rv: Some(f64::NAN),
            ad_slope: Some(0.8),
            ..FeatureSnapshot::default()
        };
        let (score, flags) = fuse_components(&features, &bar_weights());
        assert_eq!(score, 0.8);
        assert!(!flags.has_rv);
        assert!(flags.has_ad_slope);
    }

    #[test]
    fn fuse_clips_to_bound() {
        let features = FeatureSnapshot {
            rv: Some(9.0),
            ..FeatureSnapshot::default()
        };
        let (high, _) = fuse_components(&features, &bar_weights());
        assert_eq!(high, RAW_SCORE_BOUND);

        let features = FeatureSnapshot {
            rv: Some(-9.0),
            ..FeatureSnapshot::default()
        };
        let (low, _) = fuse_components(&features, &bar_weights());
        assert_eq!(low, -RAW_SCORE_BOUND);
    }

    #[test]
    fn fuse_zero_weight_total_is_zero_score() {
        // Only the zero-weighted component is present.
        let features = FeatureSnapshot {
            z_h: Some(2.0),
            ..FeatureSnapshot::default()
        };
        let (score, flags) = fuse_components(&features, &bar_weights());
        assert_eq!(score, 0.0);
        assert!(flags.has_z_h);
        assert_eq!(flags.active_count(), 1);
    }

    #[test]
    fn fuse_is_bitwise_deterministic() {
        let features = FeatureSnapshot {
            z_h: Some(0.31),
            rv: Some(-1.17),
            ad_slope: Some(0.055),
            z_dtc: None,
        };
        let weights = ComponentWeights {
            z_h: 0.2,
            rv: 0.5,
            ad_slope: 0.3,
            z_dtc: 0.0,
        };
        let (first, _) = fuse_components(&features, &weights);
        let (second, _) = fuse_components(&features, &weights);
        assert_eq!(first.to_bits(), second.to_bits());
    }
}
