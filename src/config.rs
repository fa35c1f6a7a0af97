// =============================================================================
// Engine Configuration — Overlay parameters with atomic save
// =============================================================================
//
// Central parameter hub for the institutional flow overlay.  Defaults put
// all the weight on the bar-derived components (the filing-derived ones are
// wired but weightless until their feeds ship), so an absent config file is
// a fully working setup.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::score::rescale::RESCALE_WINDOW;

/// Config file location used when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/ifo.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_weight_z_h() -> f64 {
    0.0
}

fn default_weight_rv() -> f64 {
    0.60
}

fn default_weight_ad_slope() -> f64 {
    0.40
}

fn default_weight_z_dtc() -> f64 {
    0.0
}

fn default_gamma() -> f64 {
    0.8
}

fn default_beta() -> f64 {
    0.5
}

fn default_k_max() -> f64 {
    0.25
}

fn default_ema_half_life_days() -> f64 {
    21.0
}

fn default_winsor_lower() -> f64 {
    0.05
}

fn default_winsor_upper() -> f64 {
    0.95
}

fn default_band_increase() -> f64 {
    1.0
}

fn default_band_maintain() -> f64 {
    0.0
}

fn default_band_exit() -> f64 {
    -1.0
}

fn default_exit_force() -> f64 {
    0.40
}

fn default_inc_allow() -> f64 {
    0.80
}

fn default_rv_short() -> usize {
    5
}

fn default_rv_long() -> usize {
    100
}

fn default_ad_lookback() -> usize {
    20
}

fn default_ad_slope_clip() -> f64 {
    2.0
}

fn default_holdings_staleness_days() -> i64 {
    180
}

fn default_max_history() -> usize {
    1024
}

fn default_symbols() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "NVDA".to_string(),
        "AMZN".to_string(),
        "TSLA".to_string(),
    ]
}

// =============================================================================
// Parameter groups
// =============================================================================

/// Fusion weight per component. Weights are renormalized over the present
/// components at evaluation time, so they need not sum to one here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    #[serde(default = "default_weight_z_h")]
    pub z_h: f64,

    #[serde(default = "default_weight_rv")]
    pub rv: f64,

    #[serde(default = "default_weight_ad_slope")]
    pub ad_slope: f64,

    #[serde(default = "default_weight_z_dtc")]
    pub z_dtc: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            z_h: default_weight_z_h(),
            rv: default_weight_rv(),
            ad_slope: default_weight_ad_slope(),
            z_dtc: default_weight_z_dtc(),
        }
    }
}

/// Quantile fractions the rescaler winsorizes at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinsorPercentiles {
    /// Lower quantile fraction in [0, 1).
    #[serde(default = "default_winsor_lower")]
    pub lower: f64,

    /// Upper quantile fraction in (0, 1].
    #[serde(default = "default_winsor_upper")]
    pub upper: f64,
}

impl Default for WinsorPercentiles {
    fn default() -> Self {
        Self {
            lower: default_winsor_lower(),
            upper: default_winsor_upper(),
        }
    }
}

/// Score thresholds separating the position actions. Must be ordered
/// `exit <= maintain <= increase`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionBands {
    /// Scores strictly above this band recommend Increase.
    #[serde(default = "default_band_increase")]
    pub increase: f64,

    /// Scores at or above this band (and not above `increase`) hold.
    #[serde(default = "default_band_maintain")]
    pub maintain: f64,

    /// Scores at or above this band (and below `maintain`) trim; below it,
    /// exit.
    #[serde(default = "default_band_exit")]
    pub exit: f64,
}

impl Default for DecisionBands {
    fn default() -> Self {
        Self {
            increase: default_band_increase(),
            maintain: default_band_maintain(),
            exit: default_band_exit(),
        }
    }
}

/// Probability overrides that outrank the score bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BullProbabilityThresholds {
    /// Adjusted probability below this forces Exit regardless of score.
    #[serde(default = "default_exit_force")]
    pub exit_force: f64,

    /// Adjusted probability above this allows Increase on a non-negative
    /// score.
    #[serde(default = "default_inc_allow")]
    pub inc_allow: f64,
}

impl Default for BullProbabilityThresholds {
    fn default() -> Self {
        Self {
            exit_force: default_exit_force(),
            inc_allow: default_inc_allow(),
        }
    }
}

/// Averaging windows for the relative-volume component, in bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvWindows {
    #[serde(default = "default_rv_short")]
    pub short: usize,

    #[serde(default = "default_rv_long")]
    pub long: usize,
}

impl Default for RvWindows {
    fn default() -> Self {
        Self {
            short: default_rv_short(),
            long: default_rv_long(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the overlay engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Fusion ---------------------------------------------------------------
    /// Component fusion weights.
    #[serde(default)]
    pub weights: ComponentWeights,

    // --- Overlay strengths ----------------------------------------------------
    /// Logit-space shift strength on the bull probability.
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Multiplicative tilt strength on the Kelly fraction.
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Hard cap on the adjusted Kelly fraction.
    #[serde(default = "default_k_max")]
    pub k_max: f64,

    // --- Smoothing and rescaling ----------------------------------------------
    /// EMA half-life for the raw composite, in trading days.
    #[serde(default = "default_ema_half_life_days")]
    pub ema_half_life_days: f64,

    /// Winsor quantile fractions for the adaptive rescaler.
    #[serde(default)]
    pub winsor_percentiles: WinsorPercentiles,

    // --- Decision surface -----------------------------------------------------
    /// Score bands separating Increase / Maintain / Reduce / Exit.
    #[serde(default)]
    pub decision_bands: DecisionBands,

    /// Probability overrides that outrank the bands.
    #[serde(default)]
    pub bull_thresholds: BullProbabilityThresholds,

    // --- Feature parameters ---------------------------------------------------
    /// Relative-volume averaging windows.
    #[serde(default)]
    pub rv_windows: RvWindows,

    /// Regression points for the accumulation/distribution slope.
    #[serde(default = "default_ad_lookback")]
    pub ad_lookback: usize,

    /// Symmetric clip bound on the normalized A/D slope.
    #[serde(default = "default_ad_slope_clip")]
    pub ad_slope_clip: f64,

    /// Maximum age of the newest holdings filing before Z_H is withheld.
    #[serde(default = "default_holdings_staleness_days")]
    pub holdings_staleness_days: i64,

    // --- State ----------------------------------------------------------------
    /// Smoothed scores retained per symbol; bounds the rescaler's memory.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Symbols the engine evaluates by default.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            gamma: default_gamma(),
            beta: default_beta(),
            k_max: default_k_max(),
            ema_half_life_days: default_ema_half_life_days(),
            winsor_percentiles: WinsorPercentiles::default(),
            decision_bands: DecisionBands::default(),
            bull_thresholds: BullProbabilityThresholds::default(),
            rv_windows: RvWindows::default(),
            ad_lookback: default_ad_lookback(),
            ad_slope_clip: default_ad_slope_clip(),
            holdings_staleness_days: default_holdings_staleness_days(),
            max_history: default_max_history(),
            symbols: default_symbols(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Parse and validation failures are fatal; a malformed config must never
    /// silently degrade into defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read overlay config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse overlay config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid overlay config at {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            half_life_days = config.ema_half_life_days,
            "overlay config loaded"
        );

        Ok(config)
    }

    /// Load from `path`, falling back to built-in defaults when the file does
    /// not exist. An existing-but-broken file is still a fatal error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                path = %path.display(),
                "overlay config not found, using built-in defaults"
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise overlay config")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config directory {}", parent.display())
                })?;
            }
        }

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "overlay config saved (atomic)");
        Ok(())
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, value) in [
            ("z_h", w.z_h),
            ("rv", w.rv),
            ("ad_slope", w.ad_slope),
            ("z_dtc", w.z_dtc),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("weight {name} must be finite and non-negative, got {value}");
            }
        }
        if w.z_h + w.rv + w.ad_slope + w.z_dtc == 0.0 {
            bail!("at least one component weight must be positive");
        }

        if !self.gamma.is_finite() || self.gamma < 0.0 {
            bail!("gamma must be finite and non-negative, got {}", self.gamma);
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            bail!("beta must be finite and non-negative, got {}", self.beta);
        }
        if !self.k_max.is_finite() || self.k_max <= 0.0 {
            bail!("k_max must be positive, got {}", self.k_max);
        }

        if !self.ema_half_life_days.is_finite() || self.ema_half_life_days <= 0.0 {
            bail!(
                "ema_half_life_days must be positive, got {}",
                self.ema_half_life_days
            );
        }

        let wp = &self.winsor_percentiles;
        if !(0.0..1.0).contains(&wp.lower) || !(wp.upper > wp.lower && wp.upper <= 1.0) {
            bail!(
                "winsor percentiles must satisfy 0 <= lower < upper <= 1, got {} / {}",
                wp.lower,
                wp.upper
            );
        }

        let bands = &self.decision_bands;
        if !(bands.exit <= bands.maintain && bands.maintain <= bands.increase) {
            bail!(
                "decision bands must be ordered exit <= maintain <= increase, got {} / {} / {}",
                bands.exit,
                bands.maintain,
                bands.increase
            );
        }

        let bt = &self.bull_thresholds;
        if !(0.0..=1.0).contains(&bt.exit_force)
            || !(0.0..=1.0).contains(&bt.inc_allow)
            || bt.exit_force > bt.inc_allow
        {
            bail!(
                "bull thresholds must satisfy 0 <= exit_force <= inc_allow <= 1, got {} / {}",
                bt.exit_force,
                bt.inc_allow
            );
        }

        if self.rv_windows.short == 0 || self.rv_windows.long <= self.rv_windows.short {
            bail!(
                "rv windows must satisfy 0 < short < long, got {} / {}",
                self.rv_windows.short,
                self.rv_windows.long
            );
        }

        if self.ad_lookback < 2 {
            bail!("ad_lookback must be at least 2, got {}", self.ad_lookback);
        }
        if !self.ad_slope_clip.is_finite() || self.ad_slope_clip <= 0.0 {
            bail!("ad_slope_clip must be positive, got {}", self.ad_slope_clip);
        }

        if self.holdings_staleness_days < 1 {
            bail!(
                "holdings_staleness_days must be at least 1, got {}",
                self.holdings_staleness_days
            );
        }

        if self.max_history < RESCALE_WINDOW {
            bail!(
                "max_history must hold at least the rescale window ({RESCALE_WINDOW}), got {}",
                self.max_history
            );
        }

        Ok(())
    }
}
