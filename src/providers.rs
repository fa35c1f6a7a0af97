// ============================================================================
// Slow-Data Providers
//
// Sources for the filing-derived components. Holdings filings and short
// interest arrive on a quarterly / biweekly cadence from entirely different
// plumbing than bar data, so the engine only sees them through these seams:
// evaluation-time lookups are in-memory and synchronous, refreshing the
// tables is the host's concern.
// ============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::warn;

use crate::features::holdings::HoldingsObservation;

/// Source of institutional ownership filings per symbol.
pub trait HoldingsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// All known filings for `symbol`, in any order. Empty when the symbol
    /// is not covered.
    fn holdings(&self, symbol: &str) -> Vec<HoldingsObservation>;
}

/// Source of the standardized days-to-cover improvement (Z_DTC).
pub trait ShortInterestProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Z_DTC for `symbol` as of the evaluation date, `None` when unavailable.
    fn z_dtc(&self, symbol: &str, as_of: NaiveDate) -> Option<f64>;
}

// ----------------------------------------------------------------------------
// In-memory holdings table
// ----------------------------------------------------------------------------

/// Holdings provider backed by an in-memory table, loadable from a JSON file
/// of the shape `{ "AAPL": [{ "quarter_end": "2024-03-28", "pct_held": 61.2 }] }`.
#[derive(Debug, Default)]
pub struct TableHoldingsProvider {
    table: HashMap<String, Vec<HoldingsObservation>>,
}

impl TableHoldingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from a JSON file. A missing file is not an error, it
    /// just leaves the component uncovered; a malformed file is.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                path = %path.display(),
                "holdings table not found, Z_H will be absent"
            );
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read holdings table from {}", path.display()))?;
        let table: HashMap<String, Vec<HoldingsObservation>> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse holdings table from {}", path.display()))?;

        Ok(Self { table })
    }

    /// Insert or replace the filings for one symbol.
    pub fn insert(&mut self, symbol: impl Into<String>, filings: Vec<HoldingsObservation>) {
        self.table.insert(symbol.into(), filings);
    }

    pub fn symbol_count(&self) -> usize {
        self.table.len()
    }
}

impl HoldingsProvider for TableHoldingsProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn holdings(&self, symbol: &str) -> Vec<HoldingsObservation> {
        self.table.get(symbol).cloned().unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Disabled short interest
// ----------------------------------------------------------------------------

/// Short-interest source that reports nothing. The component seam stays
/// wired while no feed is connected; the fuser renormalizes around it.
#[derive(Debug, Default)]
pub struct DisabledShortInterest;

impl ShortInterestProvider for DisabledShortInterest {
    fn name(&self) -> &str {
        "disabled"
    }

    fn z_dtc(&self, _symbol: &str, _as_of: NaiveDate) -> Option<f64> {
        None
    }
}
