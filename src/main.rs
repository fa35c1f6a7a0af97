// =============================================================================
// Institutional Flow Overlay — Validation Harness
// =============================================================================
//
// Runs the full overlay pipeline against a deterministic synthetic universe
// and checks the structural rules the engine must never violate: weight
// renormalization, score clipping, posterior direction, sizing guardrails,
// the decision table, feature signs, staleness gating, and bit-for-bit
// determinism across runs.
//
// Exits non-zero when any rule fails, so it can gate a deploy.
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ifo_engine::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use ifo_engine::decision::{classify, Action};
use ifo_engine::engine::{FlowEngine, SymbolSeries};
use ifo_engine::features::ad_slope::ad_slope;
use ifo_engine::features::holdings::HoldingsObservation;
use ifo_engine::features::relative_volume::relative_volume;
use ifo_engine::providers::{DisabledShortInterest, HoldingsProvider, TableHoldingsProvider};
use ifo_engine::score::fuse::fuse_components;
use ifo_engine::score::posterior::adjust_bull_probability;
use ifo_engine::score::sizing::adjust_kelly_fraction;
use ifo_engine::types::{Bar, FeatureSnapshot, RegimeEstimate};

/// Bars per full-window synthetic symbol; enough to saturate the rescale
/// window.
const SERIES_LEN: usize = 300;

struct RuleResult {
    name: &'static str,
    passed: bool,
    detail: String,
}

fn rule(name: &'static str, passed: bool, detail: String) -> RuleResult {
    RuleResult {
        name,
        passed,
        detail,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║   Institutional Flow Overlay — Validation Harness        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Config ────────────────────────────────────────────────────────
    let config_path =
        std::env::var("IFO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = EngineConfig::load_or_default(&config_path)?;

    if !std::path::Path::new(&config_path).exists() {
        config.save(&config_path)?;
        info!(path = %config_path, "wrote default config template");
    }

    info!(
        gamma = config.gamma,
        beta = config.beta,
        k_max = config.k_max,
        half_life_days = config.ema_half_life_days,
        symbols = ?config.symbols,
        "overlay parameters"
    );

    let config = Arc::new(config);
    let mut results: Vec<RuleResult> = Vec::new();

    // ── 3. Component-level rules ─────────────────────────────────────────

    // Weight renormalization over the two present components.
    let features = FeatureSnapshot {
        rv: Some(1.5),
        ad_slope: Some(0.8),
        ..FeatureSnapshot::default()
    };
    let (raw, flags) = fuse_components(&features, &config.weights);
    let (w_rv, w_ad) = (config.weights.rv, config.weights.ad_slope);
    let expected = (w_rv * 1.5 + w_ad * 0.8) / (w_rv + w_ad);
    results.push(rule(
        "weight_renormalization",
        (raw - expected).abs() < 0.01 && flags.has_rv && flags.has_ad_slope && !flags.has_z_h,
        format!("raw={raw:.3} expected={expected:.3}"),
    ));

    // Raw composite clipping.
    let features = FeatureSnapshot {
        rv: Some(10.0),
        ad_slope: Some(5.0),
        ..FeatureSnapshot::default()
    };
    let (clipped, _) = fuse_components(&features, &config.weights);
    results.push(rule(
        "raw_score_clipping",
        (-3.0..=3.0).contains(&clipped),
        format!("raw={clipped:.3} from extreme inputs"),
    ));

    // Posterior shift direction.
    let p_adj = adjust_bull_probability(0.60, 1.0, config.gamma);
    results.push(rule(
        "posterior_shift",
        p_adj > 0.60,
        format!("p_bull 0.600 -> {p_adj:.3} at score +1"),
    ));

    // Kelly guardrails on both sides.
    let k_pos = adjust_kelly_fraction(0.20, 1.0, config.beta, config.k_max);
    let k_neg = adjust_kelly_fraction(0.20, -1.0, config.beta, config.k_max);
    results.push(rule(
        "kelly_guardrails",
        (0.0..=config.k_max).contains(&k_pos) && (0.0..=config.k_max).contains(&k_neg),
        format!("k(+1)={k_pos:.3} k(-1)={k_neg:.3} cap={:.2}", config.k_max),
    ));

    // Decision table.
    let table: [(f64, f64, &str); 6] = [
        (1.5, 0.65, "Increase"),
        (0.5, 0.65, "Maintain"),
        (-0.5, 0.65, "Reduce"),
        (-1.5, 0.65, "Exit"),
        (1.0, 0.30, "Exit"),
        (0.5, 0.85, "Increase"),
    ];
    let mut mismatches = Vec::new();
    for (score, p_bull, expected) in table {
        let (action, _) = classify(score, p_bull, &config.decision_bands, &config.bull_thresholds);
        if action.as_str() != expected {
            mismatches.push(format!("({score:+.1}, {p_bull:.2}) -> {action}, want {expected}"));
        }
    }
    results.push(rule(
        "decision_table",
        mismatches.is_empty(),
        if mismatches.is_empty() {
            format!("{}/{} rows", table.len(), table.len())
        } else {
            mismatches.join("; ")
        },
    ));

    // Relative volume reacts to a late spike.
    let mut volumes = vec![1_000_000.0; 95];
    volumes.extend([1_500_000.0; 5]);
    let rv = relative_volume(&volumes, config.rv_windows.short, config.rv_windows.long);
    results.push(rule(
        "relative_volume_spike",
        matches!(rv, Some(v) if v > 0.0),
        format!("rv={rv:?} for a 1.5x volume spike"),
    ));

    // A/D slope sign on a clean accumulation series.
    let bars = accumulation_bars(120, 0);
    let slope = ad_slope(&bars, config.ad_lookback, config.ad_slope_clip);
    results.push(rule(
        "ad_slope_uptrend",
        matches!(slope, Some(v) if v > 0.0 && v <= config.ad_slope_clip),
        format!("slope={slope:?} for closes pinned at the highs"),
    ));

    // ── 4. Synthetic universe ────────────────────────────────────────────
    let universe = build_universe();
    let holdings = Arc::new(build_holdings_table());
    info!(
        symbols = universe.len(),
        total_bars = universe.iter().map(|s| s.bars.len()).sum::<usize>(),
        filings_covered = holdings.symbol_count(),
        "synthetic universe ready"
    );

    let engine = FlowEngine::new(
        Arc::clone(&config),
        Arc::clone(&holdings) as Arc<dyn HoldingsProvider>,
        Arc::new(DisabledShortInterest),
    );
    let records = engine.evaluate_universe(universe.clone()).await;

    // ── 5. Universe rules ────────────────────────────────────────────────

    // Bit-for-bit determinism across a fresh engine.
    let engine_repeat = FlowEngine::new(
        Arc::clone(&config),
        Arc::clone(&holdings) as Arc<dyn HoldingsProvider>,
        Arc::new(DisabledShortInterest),
    );
    let records_repeat = engine_repeat.evaluate_universe(universe).await;
    let deterministic = records.len() == records_repeat.len()
        && records.iter().zip(records_repeat.iter()).all(|(a, b)| {
            a.score.to_bits() == b.score.to_bits()
                && a.score_raw.to_bits() == b.score_raw.to_bits()
                && a.action == b.action
        });
    results.push(rule(
        "universe_determinism",
        deterministic,
        format!("{} records replayed identically", records.len()),
    ));

    // Guardrails on every record.
    let mut violations = 0usize;
    let mut guard_detail = String::new();
    let mut guards_ok = true;
    for r in &records {
        let bounded = r.score.abs() <= 2.0
            && (0.0..=1.0).contains(&r.p_bull_adjusted)
            && (0.0..=config.k_max).contains(&r.kelly_adjusted)
            && r.score_raw.abs() <= 3.0
            && !r.notes.is_empty();
        if !bounded {
            violations += 1;
            if guards_ok {
                guard_detail = format!(
                    "first violation {} {}: score={:.3} p={:.3} k={:.3}",
                    r.symbol, r.as_of, r.score, r.p_bull_adjusted, r.kelly_adjusted
                );
            }
            guards_ok = false;
        }
    }
    results.push(rule(
        "universe_guardrails",
        guards_ok,
        if guards_ok {
            format!("{} records inside all bounds", records.len())
        } else {
            format!("{violations} violations; {guard_detail}")
        },
    ));

    // A featureless symbol stays neutral the whole way through.
    let flat_neutral = records
        .iter()
        .filter(|r| r.symbol == "FLAT")
        .all(|r| r.action == Action::Maintain && r.score == 0.0);
    results.push(rule(
        "flat_symbol_neutrality",
        flat_neutral,
        "FLAT holds Maintain at score 0.0".to_string(),
    ));

    // A symbol younger than every feature window never leaves neutral either.
    let warmup_neutral = records
        .iter()
        .filter(|r| r.symbol == "NEWCO")
        .all(|r| r.components.none_active() && r.action == Action::Maintain && r.score == 0.0);
    results.push(rule(
        "short_history_warmup",
        warmup_neutral,
        "NEWCO stays neutral with no components active".to_string(),
    ));

    // Filing staleness is visible in the audit trail.
    let accum_last = records.iter().rev().find(|r| r.symbol == "ACCUM");
    let dist_last = records.iter().rev().find(|r| r.symbol == "DIST");
    let staleness_ok = matches!(accum_last, Some(r) if r.components.has_z_h)
        && matches!(dist_last, Some(r) if !r.components.has_z_h && r.notes.contains("Z_H n/a"));
    results.push(rule(
        "filing_staleness_gate",
        staleness_ok,
        "fresh filings fused, stale filings withheld".to_string(),
    ));

    // ── 6. Report ────────────────────────────────────────────────────────
    info!("──────────────── validation results ────────────────");
    let mut failed = 0usize;
    for r in &results {
        if r.passed {
            info!("PASS {:<24} {}", r.name, r.detail);
        } else {
            failed += 1;
            error!("FAIL {:<24} {}", r.name, r.detail);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} validation rules failed", results.len());
    }
    info!("all {} validation rules passed", results.len());
    Ok(())
}

// =============================================================================
// Synthetic universe
// =============================================================================

fn trading_date(day: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Days::new(day)
}

/// Rising closes pinned at the highs, volume stepping up over the last week:
/// the accumulation signature every component should flag positive.
fn accumulation_bars(n: usize, spike_bars: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.25;
            let volume = if i >= n.saturating_sub(spike_bars) {
                1_500_000.0
            } else {
                1_000_000.0
            };
            Bar {
                date: trading_date(i as u64),
                open: close - 1.5,
                high: close,
                low: close - 2.0,
                close,
                volume,
            }
        })
        .collect()
}

/// Falling closes pinned at the lows with a late volume spike: distribution.
fn distribution_bars(n: usize, spike_bars: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 175.0 - i as f64 * 0.25;
            let volume = if i >= n.saturating_sub(spike_bars) {
                1_500_000.0
            } else {
                1_000_000.0
            };
            Bar {
                date: trading_date(i as u64),
                open: close + 1.5,
                high: close + 2.0,
                low: close,
                close,
                volume,
            }
        })
        .collect()
}

/// Dead-flat price and volume; every component collapses to zero.
fn flat_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| Bar {
            date: trading_date(i as u64),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1_000_000.0,
        })
        .collect()
}

/// Alternating up/down closes and uneven volume; exercises the bounds
/// without a directional bias.
fn chop_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let up = i % 2 == 0;
            let close = if up { 101.0 } else { 99.0 };
            Bar {
                date: trading_date(i as u64),
                open: 100.0,
                high: 102.0,
                low: 98.0,
                close,
                volume: if up { 1_100_000.0 } else { 900_000.0 },
            }
        })
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

fn build_universe() -> Vec<SymbolSeries> {
    vec![
        SymbolSeries {
            symbol: "ACCUM".to_string(),
            bars: accumulation_bars(SERIES_LEN, 5),
            estimates: flat_estimates(SERIES_LEN, 0.65, 0.20),
        },
        SymbolSeries {
            symbol: "DIST".to_string(),
            bars: distribution_bars(SERIES_LEN, 5),
            estimates: flat_estimates(SERIES_LEN, 0.65, 0.20),
        },
        SymbolSeries {
            symbol: "FLAT".to_string(),
            bars: flat_bars(SERIES_LEN),
            estimates: flat_estimates(SERIES_LEN, 0.65, 0.20),
        },
        SymbolSeries {
            symbol: "CHOP".to_string(),
            bars: chop_bars(SERIES_LEN),
            estimates: flat_estimates(SERIES_LEN, 0.30, 0.20),
        },
        // Too young for any feature window; must stay neutral throughout.
        SymbolSeries {
            symbol: "NEWCO".to_string(),
            bars: accumulation_bars(30, 0),
            estimates: flat_estimates(30, 0.65, 0.20),
        },
    ]
}

fn quarter_end(year: i32, quarter: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, quarter * 3, 28).unwrap()
}

/// ACCUM carries a full, fresh filing history; DIST stopped filing in 2023
/// so its Z_H must be withheld as stale by the time the bars end.
fn build_holdings_table() -> TableHoldingsProvider {
    let mut table = TableHoldingsProvider::new();

    let accum: Vec<HoldingsObservation> = (0..11)
        .map(|q| HoldingsObservation {
            quarter_end: quarter_end(2022 + (q / 4) as i32, (q % 4) + 1),
            pct_held: 55.0 + q as f64 * 0.8,
        })
        .collect();
    table.insert("ACCUM", accum);

    let dist: Vec<HoldingsObservation> = (0..6)
        .map(|q| HoldingsObservation {
            quarter_end: quarter_end(2022 + (q / 4) as i32, (q % 4) + 1),
            pct_held: 48.0 - q as f64 * 0.5,
        })
        .collect();
    table.insert("DIST", dist);

    table
}
