//! Per-symbol precision rules derived from exchange metadata.
//!
//! The exchange publishes, per symbol, a list of filter records; only
//! `PRICE_FILTER` (field `tickSize`) and `LOT_SIZE` (field `stepSize`)
//! matter here. Both size strings imply a fractional-digit precision and a
//! grid increment; the registry derives and stores them once per load.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::warn;
use vantage_domain::Symbol;

// =============================================================================
// Exchange metadata model
// =============================================================================

/// Exchange metadata: one record per listed symbol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeMetadata {
    /// Symbol records with their filter lists
    pub symbols: Vec<SymbolRecord>,
}

/// A single symbol's metadata record.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolRecord {
    /// Exchange symbol string
    pub symbol: String,
    /// Exchange filter records; kinds this engine does not use are retained
    /// as `SymbolFilter::Other`
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Exchange filter record, tagged by `filterType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    /// Price grid filter
    #[serde(rename = "PRICE_FILTER")]
    Price {
        /// Minimum price increment, as the exchange's decimal string
        #[serde(rename = "tickSize")]
        tick_size: String,
    },
    /// Quantity grid filter
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        /// Minimum quantity increment, as the exchange's decimal string
        #[serde(rename = "stepSize")]
        step_size: String,
    },
    /// Any other filter kind (ignored)
    #[serde(other)]
    Other,
}

// =============================================================================
// SymbolRule
// =============================================================================

/// Rounding rule for one symbol.
///
/// Immutable once built. Precision counts the significant fractional digits
/// of the corresponding size string: trailing zeros beyond the last nonzero
/// digit do not count, and an all-zero fraction counts as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRule {
    /// Symbol the rule applies to
    pub symbol: Symbol,
    /// Fractional digits for prices
    pub price_precision: u32,
    /// Fractional digits for quantities
    pub quantity_precision: u32,
    /// Price grid increment (zero disables grid alignment)
    pub tick_size: Decimal,
    /// Quantity grid increment (zero disables grid alignment)
    pub step_size: Decimal,
}

impl SymbolRule {
    /// The fixed rule used for any symbol without loaded metadata.
    pub fn fallback(symbol: Symbol) -> Self {
        Self {
            symbol,
            price_precision: 4,
            quantity_precision: 3,
            tick_size: Decimal::new(1, 4),  // 0.0001
            step_size: Decimal::new(1, 3),  // 0.001
        }
    }
}

/// Number of significant fractional digits implied by a size string.
///
/// Scans the fractional digits from the right: the precision is the
/// position (counted from the decimal point) of the rightmost nonzero
/// digit. No decimal point, or an all-zero fraction, means 0.
///
/// # Examples
/// ```
/// # use vantage_precision::precision_from_size;
/// assert_eq!(precision_from_size("0.01"), 2);
/// assert_eq!(precision_from_size("0.00100000"), 3);
/// assert_eq!(precision_from_size("1.00000000"), 0);
/// assert_eq!(precision_from_size("0"), 0);
/// ```
pub fn precision_from_size(size: &str) -> u32 {
    let fraction = match size.split_once('.') {
        Some((_, fraction)) => fraction,
        None => return 0,
    };
    match fraction.rfind(|c: char| c != '0') {
        Some(index) => (index + 1) as u32,
        None => 0,
    }
}

/// Parse a size string into a grid increment.
///
/// A malformed string disables grid alignment (zero increment) rather than
/// failing the load.
fn parse_size(symbol: &str, field: &str, size: &str) -> Decimal {
    Decimal::from_str(size).unwrap_or_else(|err| {
        warn!(symbol, field, input = size, %err, "malformed size string, grid alignment disabled");
        Decimal::ZERO
    })
}

// =============================================================================
// PrecisionRegistry
// =============================================================================

/// Registry of per-symbol rounding rules.
///
/// `load` replaces the entire rule set atomically (the replacement map is
/// built completely before it is swapped in — a half-loaded set is never
/// visible). `rule_for` never fails: unknown symbols get the fixed fallback
/// rule, with a single diagnostic per symbol.
#[derive(Debug, Default)]
pub struct PrecisionRegistry {
    rules: HashMap<Symbol, SymbolRule>,
    missing_logged: Mutex<HashSet<Symbol>>,
}

impl PrecisionRegistry {
    /// Create an empty registry (every lookup falls back).
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from exchange metadata, replacing the current set.
    ///
    /// A symbol missing either required filter is skipped with a diagnostic;
    /// later lookups for it fall back to the default rule.
    pub fn load(&mut self, metadata: &ExchangeMetadata) {
        let mut next = HashMap::with_capacity(metadata.symbols.len());

        for record in &metadata.symbols {
            let symbol = match Symbol::new(record.symbol.clone()) {
                Ok(symbol) => symbol,
                Err(err) => {
                    warn!(symbol = %record.symbol, %err, "skipping metadata record");
                    continue;
                }
            };

            let mut tick_size = None;
            let mut step_size = None;
            for filter in &record.filters {
                match filter {
                    SymbolFilter::Price { tick_size: raw } => tick_size = Some(raw.as_str()),
                    SymbolFilter::LotSize { step_size: raw } => step_size = Some(raw.as_str()),
                    SymbolFilter::Other => {}
                }
            }

            let (tick, step) = match (tick_size, step_size) {
                (Some(tick), Some(step)) => (tick, step),
                _ => {
                    warn!(
                        symbol = %symbol,
                        has_price_filter = tick_size.is_some(),
                        has_lot_size = step_size.is_some(),
                        "symbol metadata incomplete, lookups will use the default rule"
                    );
                    continue;
                }
            };

            let rule = SymbolRule {
                price_precision: precision_from_size(tick),
                quantity_precision: precision_from_size(step),
                tick_size: parse_size(symbol.as_str(), "tickSize", tick),
                step_size: parse_size(symbol.as_str(), "stepSize", step),
                symbol: symbol.clone(),
            };
            next.insert(symbol, rule);
        }

        self.rules = next;
        // A reload may have filled previous gaps; let the diagnostic fire again
        // for symbols that are still missing.
        self.missing_logged.lock().unwrap().clear();
    }

    /// Look up the rule for a symbol, falling back to the default rule.
    ///
    /// The first fallback per symbol logs a warning; repeats are silent.
    pub fn rule_for(&self, symbol: &Symbol) -> SymbolRule {
        if let Some(rule) = self.rules.get(symbol) {
            return rule.clone();
        }

        let mut logged = self.missing_logged.lock().unwrap();
        if logged.insert(symbol.clone()) {
            warn!(%symbol, "no precision rule loaded, using default rule");
        }
        SymbolRule::fallback(symbol.clone())
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether any rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a rule was loaded for the symbol.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.rules.contains_key(symbol)
    }
}

// =============================================================================
// Tests
// =============================================================================
