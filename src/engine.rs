// =============================================================================
// Flow Engine — one evaluation per symbol per bar
// =============================================================================
//
// Drives the full overlay pipeline for a symbol on each daily bar close:
//
//   1. Extract bar-derived components (RV, AD slope)
//   2. Look up slow components (Z_H from filings, Z_DTC from short interest)
//   3. Fuse the present components into the raw composite
//   4. Advance the per-symbol EMA state
//   5. Rescale against the symbol's trailing score history
//   6. Adjust the external bull probability and Kelly fraction
//   7. Classify into Increase / Maintain / Reduce / Exit
//
// The engine owns no bar storage; callers hand in the trailing bar window
// they already maintain. Per-symbol score state lives in the arena, so
// symbols can be evaluated concurrently without sharing anything else.
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::decision::{classify, format_notes, DecisionRecord};
use crate::features::ad_slope::ad_slope;
use crate::features::holdings::holdings_z_score;
use crate::features::relative_volume::relative_volume;
use crate::providers::{HoldingsProvider, ShortInterestProvider};
use crate::score::fuse::fuse_components;
use crate::score::posterior::adjust_bull_probability;
use crate::score::rescale::rescale_latest;
use crate::score::sizing::adjust_kelly_fraction;
use crate::score::smooth::half_life_alpha;
use crate::state::ScoreArena;
use crate::types::{Bar, FeatureSnapshot, RegimeEstimate};

/// One symbol's inputs for a batch evaluation: daily bars and the external
/// regime estimates observed alongside them, index-aligned.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub estimates: Vec<RegimeEstimate>,
}

/// Stateful overlay engine shared across symbol tasks.
pub struct FlowEngine {
    config: Arc<EngineConfig>,
    arena: ScoreArena,
    /// Precomputed from `ema_half_life_days`; the half-life never changes
    /// without constructing a new engine.
    alpha: f64,
    holdings: Arc<dyn HoldingsProvider>,
    short_interest: Arc<dyn ShortInterestProvider>,
}

impl FlowEngine {
    /// Create an engine wired to the given slow-data providers.
    pub fn new(
        config: Arc<EngineConfig>,
        holdings: Arc<dyn HoldingsProvider>,
        short_interest: Arc<dyn ShortInterestProvider>,
    ) -> Arc<Self> {
        let alpha = half_life_alpha(config.ema_half_life_days);
        let arena = ScoreArena::new(config.max_history);
        Arc::new(Self {
            config,
            arena,
            alpha,
            holdings,
            short_interest,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one symbol on one bar close.
    ///
    /// `bars` is the trailing daily window oldest-first, with the bar being
    /// evaluated last; short windows simply leave the bar-derived components
    /// absent. `as_of` drives filing staleness and is usually the last bar's
    /// date.
    pub fn evaluate_tick(
        &self,
        symbol: &str,
        as_of: NaiveDate,
        bars: &[Bar],
        estimate: &RegimeEstimate,
    ) -> DecisionRecord {
        let cfg = &self.config;

        // ── 1. Bar-derived components ────────────────────────────────────
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let rv = relative_volume(&volumes, cfg.rv_windows.short, cfg.rv_windows.long);
        let ad = ad_slope(bars, cfg.ad_lookback, cfg.ad_slope_clip);

        // ── 2. Slow components ───────────────────────────────────────────
        let filings = self.holdings.holdings(symbol);
        let holdings_signal = holdings_z_score(&filings, as_of, cfg.holdings_staleness_days);
        if holdings_signal.is_stale {
            debug!(symbol, "newest holdings filing is stale, Z_H withheld");
        }
        let z_dtc = self.short_interest.z_dtc(symbol, as_of);

        let features = FeatureSnapshot {
            z_h: holdings_signal.z_h,
            rv,
            ad_slope: ad,
            z_dtc,
        };

        // ── 3. Fuse ──────────────────────────────────────────────────────
        let (score_raw, flags) = fuse_components(&features, &cfg.weights);

        // ── 4. Smooth ────────────────────────────────────────────────────
        let (score_smoothed, history) = self.arena.advance(symbol, score_raw, self.alpha);

        // ── 5. Rescale ───────────────────────────────────────────────────
        let score = rescale_latest(
            &history,
            cfg.winsor_percentiles.lower,
            cfg.winsor_percentiles.upper,
        );

        // ── 6. Probability and sizing overlays ───────────────────────────
        let p_bull_adjusted = adjust_bull_probability(estimate.p_bull_raw, score, cfg.gamma);
        let kelly_adjusted =
            adjust_kelly_fraction(estimate.kelly_base, score, cfg.beta, cfg.k_max);

        // ── 7. Classify ──────────────────────────────────────────────────
        let (action, reason) = classify(
            score,
            p_bull_adjusted,
            &cfg.decision_bands,
            &cfg.bull_thresholds,
        );
        let notes = format_notes(&features, &flags);

        debug!(
            symbol,
            action = %action,
            score = format!("{:.3}", score),
            raw = format!("{:.3}", score_raw),
            p_adj = format!("{:.3}", p_bull_adjusted),
            k_adj = format!("{:.3}", kelly_adjusted),
            notes = %notes,
            "overlay evaluated"
        );

        DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            as_of,
            action,
            reason: reason.to_string(),
            score_raw,
            score_smoothed,
            score,
            p_bull_raw: estimate.p_bull_raw,
            p_bull_adjusted,
            kelly_base: estimate.kelly_base,
            kelly_adjusted,
            components: flags,
            notes,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Evaluate a whole bar series for one symbol, oldest-first, exactly as
    /// the streaming engine would have seen it.
    ///
    /// Feeds the same per-symbol state as `evaluate_tick`, so backfilling a
    /// fresh symbol leaves its EMA and history warm for live ticks.
    pub fn evaluate_series(
        &self,
        symbol: &str,
        bars: &[Bar],
        estimates: &[RegimeEstimate],
    ) -> Vec<DecisionRecord> {
        if bars.len() != estimates.len() {
            warn!(
                symbol,
                bars = bars.len(),
                estimates = estimates.len(),
                "bar/estimate length mismatch, truncating to the shorter"
            );
        }
        let ticks = bars.len().min(estimates.len());

        let mut records = Vec::with_capacity(ticks);
        for t in 0..ticks {
            let record =
                self.evaluate_tick(symbol, bars[t].date, &bars[..=t], &estimates[t]);
            records.push(record);
        }
        records
    }

    /// Evaluate many symbols concurrently, one task per symbol.
    ///
    /// Per-symbol state is independent, so the records are identical to a
    /// serial pass; they come back sorted by symbol and date to keep the
    /// output order deterministic regardless of task scheduling.
    pub async fn evaluate_universe(
        self: Arc<Self>,
        universe: Vec<SymbolSeries>,
    ) -> Vec<DecisionRecord> {
        let mut handles = Vec::with_capacity(universe.len());
        for series in universe {
            let engine = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                engine.evaluate_series(&series.symbol, &series.bars, &series.estimates)
            }));
        }

        let mut records = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(mut symbol_records) => records.append(&mut symbol_records),
                Err(e) => warn!(error = %e, "symbol evaluation task failed"),
            }
        }

        records.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.as_of.cmp(&b.as_of)));
        records
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Action;
    use crate::features::holdings::HoldingsObservation;
    use crate::providers::{DisabledShortInterest, TableHoldingsProvider};
    use crate::score::rescale::RESCALED_BOUND;

    fn bar(offset: u64, close: f64, volume: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Days::new(offset);
        Bar {
            date,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    fn accumulation_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| bar(i as u64, 100.0 + i as f64 * 0.5, 1_000_000.0))
            .collect()
    }

    fn flat_estimates(n: usize, p_bull: f64, kelly: f64) -> Vec<RegimeEstimate> {
        vec![
            RegimeEstimate {
                p_bull_raw: p_bull,
                kelly_base: kelly,
            };
            n
        ]
    }

    fn engine_with_defaults() -> Arc<FlowEngine> {
        FlowEngine::new(
            Arc::new(EngineConfig::default()),
            Arc::new(TableHoldingsProvider::new()),
            Arc::new(DisabledShortInterest),
        )
    }

    #[test]
    fn full_pipeline_produces_bounded_record() {
        let engine = engine_with_defaults();
        let bars = accumulation_bars(130);
        let estimate = RegimeEstimate {
            p_bull_raw: 0.65,
            kelly_base: 0.20,
        };

        let record =
            engine.evaluate_tick("ACME", bars[bars.len() - 1].date, &bars, &estimate);

        assert_eq!(record.symbol, "ACME");
        assert_eq!(record.as_of, bars[bars.len() - 1].date);
        assert!(record.components.has_rv);
        assert!(record.components.has_ad_slope);
        assert!(!record.components.has_z_h);
        assert!(!record.components.has_z_dtc);
        assert!(record.score.abs() <= RESCALED_BOUND);
        assert!((0.0..=1.0).contains(&record.p_bull_adjusted));
        assert!((0.0..=0.25).contains(&record.kelly_adjusted));
        assert!(record.notes.contains("RV z="));
        assert!(record.notes.contains("Z_H n/a"));
    }

    #[test]
    fn warmup_window_yields_neutral_maintain() {
        let engine = engine_with_defaults();
        let bars = accumulation_bars(10);
        let estimate = RegimeEstimate {
            p_bull_raw: 0.65,
            kelly_base: 0.20,
        };

        let record =
            engine.evaluate_tick("ACME", bars[bars.len() - 1].date, &bars, &estimate);

        assert!(record.components.none_active());
        assert_eq!(record.score_raw, 0.0);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.action, Action::Maintain);
    }

    #[test]
    fn collapsed_probability_forces_exit() {
        let engine = engine_with_defaults();
        let bars = accumulation_bars(10);
        let estimate = RegimeEstimate {
            p_bull_raw: 0.20,
            kelly_base: 0.20,
        };

        let record =
            engine.evaluate_tick("ACME", bars[bars.len() - 1].date, &bars, &estimate);
        assert_eq!(record.action, Action::Exit);
        assert_eq!(record.reason, "bull probability below force-exit floor");
    }

    #[test]
    fn fresh_and_stale_filings_toggle_z_h() {
        let mut config = EngineConfig::default();
        config.weights.z_h = 0.3;
        let config = Arc::new(config);

        let as_of = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        let filings: Vec<HoldingsObservation> = (0..8)
            .map(|q| HoldingsObservation {
                quarter_end: as_of - chrono::Days::new(90 * (8 - q)),
                pct_held: 50.0 + q as f64 + (q % 3) as f64,
            })
            .collect();

        let mut fresh = TableHoldingsProvider::new();
        fresh.insert("ACME", filings.clone());
        let engine = FlowEngine::new(
            Arc::clone(&config),
            Arc::new(fresh),
            Arc::new(DisabledShortInterest),
        );
        let bars = accumulation_bars(130);
        let estimate = RegimeEstimate {
            p_bull_raw: 0.65,
            kelly_base: 0.20,
        };
        let record = engine.evaluate_tick("ACME", as_of, &bars, &estimate);
        assert!(record.components.has_z_h);
        assert!(record.notes.contains("Z_H="));

        // Same filings evaluated a year later are stale.
        let later = as_of + chrono::Days::new(365);
        let mut stale = TableHoldingsProvider::new();
        stale.insert("ACME", filings);
        let engine = FlowEngine::new(
            config,
            Arc::new(stale),
            Arc::new(DisabledShortInterest),
        );
        let record = engine.evaluate_tick("ACME", later, &bars, &estimate);
        assert!(!record.components.has_z_h);
        assert!(record.notes.contains("Z_H n/a"));
    }

    #[test]
    fn series_evaluation_is_deterministic() {
        let bars = accumulation_bars(140);
        let estimates = flat_estimates(140, 0.65, 0.20);

        let first = engine_with_defaults().evaluate_series("ACME", &bars, &estimates);
        let second = engine_with_defaults().evaluate_series("ACME", &bars, &estimates);

        assert_eq!(first.len(), 140);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.score.to_bits(), b.score.to_bits());
            assert_eq!(a.score_raw.to_bits(), b.score_raw.to_bits());
            assert_eq!(a.action, b.action);
            assert_eq!(a.as_of, b.as_of);
        }
    }

    #[test]
    fn series_length_mismatch_truncates() {
        let engine = engine_with_defaults();
        let bars = accumulation_bars(20);
        let estimates = flat_estimates(15, 0.65, 0.20);
        let records = engine.evaluate_series("ACME", &bars, &estimates);
        assert_eq!(records.len(), 15);
    }

    #[tokio::test]
    async fn universe_matches_serial_evaluation() {
        let bars = accumulation_bars(130);
        let estimates = flat_estimates(130, 0.65, 0.20);
        let universe = vec![
            SymbolSeries {
                symbol: "AAA".to_string(),
                bars: bars.clone(),
                estimates: estimates.clone(),
            },
            SymbolSeries {
                symbol: "BBB".to_string(),
                bars: bars.clone(),
                estimates: estimates.clone(),
            },
        ];

        let concurrent = engine_with_defaults().evaluate_universe(universe).await;
        assert_eq!(concurrent.len(), 260);
        // Sorted by symbol, then date.
        assert!(concurrent[..130].iter().all(|r| r.symbol == "AAA"));
        assert!(concurrent[130..].iter().all(|r| r.symbol == "BBB"));

        let serial = engine_with_defaults().evaluate_series("AAA", &bars, &estimates);
        for (c, s) in concurrent[..130].iter().zip(serial.iter()) {
            assert_eq!(c.score.to_bits(), s.score.to_bits());
            assert_eq!(c.action, s.action);
        }
    }
}
