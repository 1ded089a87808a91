//! Display projections.
//!
//! The boundary where raw numeric values cross to a human-facing surface:
//! every price and quantity passes through the normalizer, and derived PnL
//! figures are rounded to display precision. Rows are plain serializable
//! values cut loose from the stores.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use vantage_domain::{Order, OrderSide, OrderStatus, OrderType, Position, Side, Symbol};
use vantage_precision::{NumericNormalizer, PrecisionRegistry};

/// Fractional digits for quote-currency PnL figures.
const PNL_DISPLAY_DP: u32 = 2;

/// A display-ready order row.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    /// Exchange order id
    pub order_id: i64,
    /// Trading pair
    pub symbol: Symbol,
    /// Buy or sell
    pub side: OrderSide,
    /// Order type
    pub order_type: OrderType,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Limit price, normalized
    pub price: Decimal,
    /// Average fill price, normalized
    pub avg_price: Decimal,
    /// Original quantity, normalized
    pub orig_qty: Decimal,
    /// Filled quantity, normalized
    pub executed_qty: Decimal,
    /// Reduce-only flag
    pub reduce_only: bool,
    /// Close-position flag
    pub close_position: bool,
    /// Realized profit, display-rounded
    pub realized_profit: Decimal,
    /// Last update time (epoch milliseconds)
    pub update_time: i64,
}

impl OrderRow {
    /// Build a row from a stored order.
    pub fn from_order(
        order: &Order,
        registry: &PrecisionRegistry,
        normalizer: &NumericNormalizer,
    ) -> Self {
        let symbol = &order.symbol;
        Self {
            order_id: order.order_id,
            symbol: symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            status: order.status,
            price: normalizer.normalize_price(registry, symbol, order.price),
            avg_price: normalizer.normalize_price(registry, symbol, order.avg_price),
            orig_qty: normalizer.normalize_quantity(registry, symbol, order.orig_qty),
            executed_qty: normalizer.normalize_quantity(registry, symbol, order.executed_qty),
            reduce_only: order.reduce_only,
            close_position: order.close_position,
            realized_profit: round_display(order.realized_profit),
            update_time: order.update_time,
        }
    }
}

/// A display-ready position row.
#[derive(Debug, Clone, Serialize)]
pub struct PositionRow {
    /// Trading pair
    pub symbol: Symbol,
    /// Position direction
    pub side: Side,
    /// Position size, normalized
    pub quantity: Decimal,
    /// Entry price, normalized
    pub entry_price: Decimal,
    /// Latest mark price, normalized
    pub mark_price: Decimal,
    /// Unrealized PnL, display-rounded
    pub pnl: Decimal,
    /// PnL percent, display-rounded
    pub pnl_percent: Decimal,
    /// Margin, display-rounded
    pub margin: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
    /// Stop-loss trigger, normalized, if set
    pub stop_loss: Option<Decimal>,
    /// Take-profit trigger, normalized, if set
    pub take_profit: Option<Decimal>,
}

impl PositionRow {
    /// Build a row from a stored position.
    pub fn from_position(
        position: &Position,
        registry: &PrecisionRegistry,
        normalizer: &NumericNormalizer,
    ) -> Self {
        let symbol = &position.symbol;
        Self {
            symbol: symbol.clone(),
            side: position.side,
            quantity: normalizer.normalize_quantity(registry, symbol, position.quantity),
            entry_price: normalizer.normalize_price(registry, symbol, position.entry_price),
            mark_price: normalizer.normalize_price(registry, symbol, position.mark_price),
            pnl: round_display(position.pnl),
            pnl_percent: round_display(position.pnl_percent),
            margin: round_display(position.margin),
            leverage: position.leverage,
            stop_loss: position
                .stop_loss
                .map(|price| normalizer.normalize_price(registry, symbol, price)),
            take_profit: position
                .take_profit
                .map(|price| normalizer.normalize_price(registry, symbol, price)),
        }
    }
}

/// Round a quote-currency figure for display.
fn round_display(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(PNL_DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vantage_precision::ExchangeMetadata;

    fn registry() -> PrecisionRegistry {
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
    fn test_order_row_normalizes_numerics() {
        let order = Order {
            order_id: 7,
            symbol: Symbol::new("BTCUSDT").unwrap(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::PartiallyFilled,
            orig_qty: dec!(0.4005),
            executed_qty: dec!(0.1004),
            avg_price: dec!(94999.93),
            price: dec!(95000.17),
            reduce_only: false,
            close_position: false,
            realized_profit: dec!(1.2549),
            update_time: 5,
        };

        let row = OrderRow::from_order(&order, &registry(), &NumericNormalizer::new());

        assert_eq!(row.price, dec!(95000.2));
        assert_eq!(row.avg_price, dec!(94999.9));
        assert_eq!(row.orig_qty, dec!(0.401));
        assert_eq!(row.executed_qty, dec!(0.1));
        assert_eq!(row.realized_profit, dec!(1.25));
    }

    #[test]
    fn test_position_row_rounds_pnl_for_display() {
        let position = Position {
            symbol: Symbol::new("BTCUSDT").unwrap(),
            side: Side::Long,
            quantity: dec!(0.5),
            entry_price: dec!(95000),
            margin: dec!(4750.004),
            leverage: 10,
            stop_loss: Some(dec!(93000.04)),
            take_profit: None,
            mark_price: dec!(95123.44),
            pnl: dec!(61.719999),
            pnl_percent: dec!(0.129936),
        };

        let row = PositionRow::from_position(&position, &registry(), &NumericNormalizer::new());

        assert_eq!(row.mark_price, dec!(95123.4));
        assert_eq!(row.pnl, dec!(61.72));
        assert_eq!(row.pnl_percent, dec!(0.13));
        assert_eq!(row.margin, dec!(4750));
        assert_eq!(row.stop_loss, Some(dec!(93000)));
        assert_eq!(row.take_profit, None);
    }
}
