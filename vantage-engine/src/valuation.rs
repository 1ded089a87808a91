//! Live position valuation.
//!
//! Valuation is a read-time projection over stored positions: a mark-price
//! tick produces fresh derived fields from the authoritative entry data.
//! Nothing is accumulated incrementally, so repeated ticks cannot drift,
//! and the authoritative fields are never written.

use rust_decimal::Decimal;
use tracing::trace;
use vantage_domain::{MarkPriceTick, Side};
use vantage_store::PositionBook;

/// Derived fields for one position at one mark price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valuation {
    /// The mark price the fields were computed at
    pub mark_price: Decimal,
    /// Unrealized PnL in quote currency
    pub pnl: Decimal,
    /// Unrealized PnL as a percentage of entry notional
    pub pnl_percent: Decimal,
}

/// Value a position at a mark price.
///
/// `pnl = (mark - entry) * quantity` for longs, negated for shorts;
/// `pnl_percent = pnl / (quantity * entry) * 100`, or 0 when the entry
/// notional is not positive. Idempotent for a fixed input tuple.
///
/// # Examples
/// ```
/// # use rust_decimal_macros::dec;
/// # use vantage_domain::Side;
/// # use vantage_engine::revalue;
/// let long = revalue(Side::Long, dec!(100), dec!(2), dec!(110));
/// assert_eq!(long.pnl, dec!(20));
/// assert_eq!(long.pnl_percent, dec!(10));
///
/// let short = revalue(Side::Short, dec!(100), dec!(2), dec!(110));
/// assert_eq!(short.pnl, dec!(-20));
/// assert_eq!(short.pnl_percent, dec!(-10));
/// ```
pub fn revalue(side: Side, entry_price: Decimal, quantity: Decimal, mark: Decimal) -> Valuation {
    let price_diff = mark - entry_price;
    let pnl = match side {
        Side::Long => price_diff * quantity,
        Side::Short => -price_diff * quantity,
    };

    let notional = quantity * entry_price;
    let pnl_percent = if notional > Decimal::ZERO {
        pnl / notional * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    Valuation {
        mark_price: mark,
        pnl,
        pnl_percent,
    }
}

/// Applies mark-price ticks over the position book.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveValuationEngine;

impl LiveValuationEngine {
    /// Create a valuation engine.
    pub fn new() -> Self {
        Self
    }

    /// Revalue every stored position on the tick's symbol.
    ///
    /// Writes only the derived fields; entry data, quantity, margin and
    /// leverage are left untouched. A tick that changes nothing (same mark
    /// as before) emits no notifications. Returns the changed-position
    /// count.
    pub fn apply_mark_price(&self, book: &mut PositionBook, tick: &MarkPriceTick) -> usize {
        let symbol = tick.symbol.clone();
        let mark = tick.mark_price;

        let changed = book.update_matching(
            |position| position.symbol == symbol,
            |position| {
                let valuation = revalue(position.side, position.entry_price, position.quantity, mark);
                let unchanged = position.mark_price == valuation.mark_price
                    && position.pnl == valuation.pnl
                    && position.pnl_percent == valuation.pnl_percent;
                if unchanged {
                    return false;
                }
                position.mark_price = valuation.mark_price;
                position.pnl = valuation.pnl;
                position.pnl_percent = valuation.pnl_percent;
                true
            },
        );

        trace!(symbol = %tick.symbol, mark = %mark, changed, "mark price applied");
        changed
    }
}

// =============================================================================
// Tests
// =============================================================================
