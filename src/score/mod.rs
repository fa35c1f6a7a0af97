// ============================================================================
// Score Pipeline Module
//
// Turns a partially-populated feature snapshot into the bounded overlay
// score and its downstream adjustments, in five fixed stages:
//
//   fuse      -> raw composite in [-3, 3] over the present components
//   smooth    -> half-life EMA of the raw composite
//   rescale   -> winsorized remap of the smoothed score into [-2, 2]
//   posterior -> logit-shift of the external bull probability
//   sizing    -> multiplicative overlay on the base Kelly fraction
//
// Every stage is a pure function; state (score history per symbol) lives
// in `crate::state` and is threaded through by the engine.
// ============================================================================

pub mod fuse;
pub mod posterior;
pub mod rescale;
pub mod sizing;
pub mod smooth;

pub use fuse::{fuse_components, RAW_SCORE_BOUND};
pub use posterior::adjust_bull_probability;
pub use rescale::{rescale_latest, RESCALED_BOUND, RESCALE_WINDOW};
pub use sizing::adjust_kelly_fraction;
pub use smooth::{half_life_alpha, smooth_next};
