//! Market data primitives.

use crate::value_objects::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A mark-price tick for one symbol.
///
/// The mark price is the reference price used to value open positions; a
/// tick triggers a fresh recomputation of every derived field on every
/// position for the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPriceTick {
    /// Trading pair the tick is for
    pub symbol: Symbol,
    /// Mark price
    pub mark_price: Decimal,
    /// Event time (exchange epoch milliseconds)
    pub event_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_round_trip() {
        let tick = MarkPriceTick {
            symbol: Symbol::new("BTCUSDT").unwrap(),
            mark_price: dec!(95123.45),
            event_time: 1_700_000_000_000,
        };

        let json = serde_json::to_string(&tick).unwrap();
        let parsed: MarkPriceTick = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tick);
    }
}
