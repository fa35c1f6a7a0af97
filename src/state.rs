use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::score::smooth::smooth_next;

// ---------------------------------------------------------------------------
// Per-symbol score state
// ---------------------------------------------------------------------------

/// Smoothed-score memory for one symbol: the last EMA value plus the trailing
/// history the rescaler draws its winsor bounds from.
#[derive(Debug, Default)]
struct SymbolScoreState {
    smoothed: Option<f64>,
    history: VecDeque<f64>,
}

// ---------------------------------------------------------------------------
// ScoreArena -- thread-safe score state per symbol
// ---------------------------------------------------------------------------

/// Thread-safe store of smoothed-score state keyed by symbol.
///
/// The engine advances one symbol per evaluation; the arena keeps the EMA
/// recursion and the trailing history behind a single lock so concurrent
/// symbol tasks never observe a half-updated state.
pub struct ScoreArena {
    states: RwLock<HashMap<String, SymbolScoreState>>,
    max_history: usize,
}

impl ScoreArena {
    /// Create an arena retaining at most `max_history` smoothed scores per
    /// symbol.
    pub fn new(max_history: usize) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Fold one raw composite score into the symbol's EMA state.
    ///
    /// Returns the new smoothed value together with a snapshot of the
    /// trailing smoothed history (oldest first, new value last) for the
    /// rescaler. The history is trimmed to `max_history` before the
    /// snapshot is taken.
    pub fn advance(&self, symbol: &str, raw_score: f64, alpha: f64) -> (f64, Vec<f64>) {
        let mut map = self.states.write();
        let state = map.entry(symbol.to_string()).or_default();

        let smoothed = smooth_next(state.smoothed, raw_score, alpha);
        state.smoothed = Some(smoothed);
        state.history.push_back(smoothed);
        while state.history.len() > self.max_history {
            state.history.pop_front();
        }

        (smoothed, state.history.iter().copied().collect())
    }

    /// Last smoothed value for a symbol, if it has ever been evaluated.
    pub fn last_smoothed(&self, symbol: &str) -> Option<f64> {
        self.states.read().get(symbol).and_then(|s| s.smoothed)
    }

    /// Number of smoothed scores currently retained for a symbol.
    pub fn history_len(&self, symbol: &str) -> usize {
        self.states
            .read()
            .get(symbol)
            .map_or(0, |s| s.history.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_passes_through() {
        let arena = ScoreArena::new(16);
        let (smoothed, history) = arena.advance("AAPL", 1.4, 0.5);
        assert_eq!(smoothed, 1.4);
        assert_eq!(history, vec![1.4]);
    }

    #[test]
    fn ema_recursion_across_calls() {
        let arena = ScoreArena::new(16);
        arena.advance("AAPL", 2.0, 0.5);
        let (second, _) = arena.advance("AAPL", 4.0, 0.5);
        let (third, history) = arena.advance("AAPL", 8.0, 0.5);

        assert!((second - 3.0).abs() < 1e-12);
        assert!((third - 5.5).abs() < 1e-12);
        assert_eq!(history.len(), 3);
        assert!((history[2] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn history_trims_to_capacity() {
        let arena = ScoreArena::new(3);
        // alpha 1.0 -> smoothed tracks raw exactly.
        for i in 0..5 {
            arena.advance("AAPL", i as f64, 1.0);
        }
        assert_eq!(arena.history_len("AAPL"), 3);
        let (_, history) = arena.advance("AAPL", 5.0, 1.0);
        assert_eq!(history, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn symbols_are_isolated() {
        let arena = ScoreArena::new(16);
        arena.advance("AAPL", 1.0, 0.5);
        arena.advance("MSFT", 9.0, 0.5);

        assert_eq!(arena.last_smoothed("AAPL"), Some(1.0));
        assert_eq!(arena.last_smoothed("MSFT"), Some(9.0));
        assert_eq!(arena.history_len("AAPL"), 1);
    }

    #[test]
    fn unknown_symbol_is_empty() {
        let arena = ScoreArena::new(16);
        assert_eq!(arena.last_smoothed("TSLA"), None);
        assert_eq!(arena.history_len("TSLA"), 0);
    }
}
