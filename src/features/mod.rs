// =============================================================================
// Feature Extraction Module
// =============================================================================
//
// Pure, side-effect-free implementations of the institutional-flow feature
// extractors.  Every extractor reports absence as a first-class outcome
// (`Option<f64>`, or a signal struct carrying one) so callers are forced to
// handle insufficient-history and numerical-edge-case scenarios.

pub mod ad_slope;
pub mod holdings;
pub mod relative_volume;
