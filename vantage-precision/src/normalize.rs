//! Numeric normalization against per-symbol rules.
//!
//! Every price or quantity that crosses to a human-facing surface passes
//! through here: rounded to the rule's precision, re-aligned to the
//! exchange grid, and canonicalized so no representation artifacts survive.

use crate::registry::PrecisionRegistry;
use rust_decimal::{Decimal, RoundingStrategy};
use vantage_domain::Symbol;

/// Snap a value to a precision and grid increment.
///
/// 1. Round to `precision` fractional digits, half away from zero.
/// 2. If `increment` is nonzero, re-align to its nearest exact multiple
///    (guards against grids not expressible as `10^-precision`).
/// 3. Canonicalize through a final fixed-precision rounding so the result
///    is a stable, artifact-free representative.
///
/// A zero increment skips step 2 entirely; division by zero cannot occur.
pub fn snap_to_increment(value: Decimal, precision: u32, increment: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);

    let aligned = if increment.is_zero() {
        rounded
    } else {
        let steps =
            (rounded / increment).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        steps * increment
    };

    aligned
        .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Applies a symbol's rounding rule to raw numeric input.
///
/// A pure function of `(symbol, raw value, current rule set)`: the only
/// side effect is the registry's one-time missing-rule diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericNormalizer;

impl NumericNormalizer {
    /// Create a normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Normalize a price to the symbol's price precision and tick grid.
    pub fn normalize_price(
        &self,
        registry: &PrecisionRegistry,
        symbol: &Symbol,
        raw: Decimal,
    ) -> Decimal {
        let rule = registry.rule_for(symbol);
        snap_to_increment(raw, rule.price_precision, rule.tick_size)
    }

    /// Normalize a quantity to the symbol's quantity precision and step grid.
    pub fn normalize_quantity(
        &self,
        registry: &PrecisionRegistry,
        symbol: &Symbol,
        raw: Decimal,
    ) -> Decimal {
        let rule = registry.rule_for(symbol);
        snap_to_increment(raw, rule.quantity_precision, rule.step_size)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ExchangeMetadata;
    use rust_decimal_macros::dec;

    fn sym(pair: &str) -> Symbol {
        Symbol::new(pair).unwrap()
    }

    fn loaded_registry() -> PrecisionRegistry {
        let metadata: ExchangeMetadata = serde_json::from_str(
            r#"
            {
                "symbols": [
                    {
                        "symbol": "BTCUSDT",
                        "filters": [
                            {"filterType": "PRICE_FILTER", "tickSize": "0.10"},
                            {"filterType": "LOT_SIZE", "stepSize": "0.001"}
                        ]
                    },
                    {
                        "symbol": "ODDUSDT",
                        "filters": [
                            {"filterType": "PRICE_FILTER", "tickSize": "0.00025"},
                            {"filterType": "LOT_SIZE", "stepSize": "0"}
                        ]
                    }
                ]
            }
            "#,
        )
        .unwrap();

        let mut registry = PrecisionRegistry::new();
        registry.load(&metadata);
        registry
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();
        let btc = sym("BTCUSDT");

        assert_eq!(normalizer.normalize_price(&registry, &btc, dec!(95000.15)), dec!(95000.2));
        assert_eq!(normalizer.normalize_price(&registry, &btc, dec!(-95000.15)), dec!(-95000.2));
        assert_eq!(normalizer.normalize_quantity(&registry, &btc, dec!(0.0015)), dec!(0.002));
    }

    #[test]
    fn test_aligns_to_tick_grid() {
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();
        let btc = sym("BTCUSDT");

        let price = normalizer.normalize_price(&registry, &btc, dec!(95000.137));
        assert_eq!(price, dec!(95000.1));
        // Result is an exact multiple of the tick
        assert!((price % dec!(0.10)).is_zero());
    }

    #[test]
    fn test_grid_not_expressible_as_power_of_ten() {
        // Tick 0.00025: precision from the string is 5, so the grid survives
        // the precision rounding and alignment lands on exact multiples.
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();
        let odd = sym("ODDUSDT");

        let price = normalizer.normalize_price(&registry, &odd, dec!(0.00037));
        assert_eq!(price, dec!(0.00025));
        assert!((price % dec!(0.00025)).is_zero());
    }

    #[test]
    fn test_zero_step_skips_alignment() {
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();
        let odd = sym("ODDUSDT");

        // stepSize "0": only precision rounding applies, no division happens
        assert_eq!(normalizer.normalize_quantity(&registry, &odd, dec!(3.7)), dec!(4));
    }

    #[test]
    fn test_idempotent() {
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();

        for (symbol, raw) in [
            (sym("BTCUSDT"), dec!(95000.137)),
            (sym("BTCUSDT"), dec!(0.1)),
            (sym("ODDUSDT"), dec!(0.00037)),
            (sym("UNKNOWNSYM"), dec!(12.345678)),
        ] {
            let once = normalizer.normalize_price(&registry, &symbol, raw);
            let twice = normalizer.normalize_price(&registry, &symbol, once);
            assert_eq!(once, twice, "normalize_price not idempotent for {} {}", symbol, raw);
        }
    }

    #[test]
    fn test_artifact_elimination() {
        // The classic 0.1 + 0.2 drift, reproduced at the decimal layer with
        // an over-precise input: the output is the canonical grid value.
        let registry = loaded_registry();
        let normalizer = NumericNormalizer::new();
        let btc = sym("BTCUSDT");

        let drifted = dec!(0.30000000000000004);
        assert_eq!(normalizer.normalize_price(&registry, &btc, drifted), dec!(0.3));
    }

    #[test]
    fn test_unknown_symbol_uses_default_rule() {
        let registry = PrecisionRegistry::new();
        let normalizer = NumericNormalizer::new();
        let unknown = sym("UNKNOWNSYM");

        // Default rule: price precision 4, tick 0.0001
        assert_eq!(
            normalizer.normalize_price(&registry, &unknown, dec!(1.23456789)),
            dec!(1.2346)
        );
        // Default rule: quantity precision 3, step 0.001
        assert_eq!(
            normalizer.normalize_quantity(&registry, &unknown, dec!(0.0123456)),
            dec!(0.012)
        );
    }

    #[test]
    fn test_snap_with_zero_increment() {
        assert_eq!(snap_to_increment(dec!(1.005), 2, Decimal::ZERO), dec!(1.01));
        assert_eq!(snap_to_increment(dec!(-1.005), 2, Decimal::ZERO), dec!(-1.01));
    }
}
