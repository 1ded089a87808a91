//! Typed order book: the order instantiation of the generic store.

use crate::store::{EntityFilter, EntityPatch, StoreEntity};
use vantage_domain::{Order, OrderPatch, StatusFilter, Symbol};

/// Reconciling cache of orders, keyed by exchange order id.
pub type OrderBook = crate::store::EntityStore<Order, OrderFilter>;

impl StoreEntity for Order {
    type Key = i64;
    const KIND: &'static str = "order";

    fn key(&self) -> i64 {
        self.order_id
    }
}

impl EntityPatch for OrderPatch {
    type Entity = Order;

    fn key(&self) -> i64 {
        self.order_id
    }

    fn into_entity(&self) -> Order {
        self.into_order()
    }

    fn merge_into(&self, order: &mut Order) {
        self.apply_to(order);
    }
}

/// Read-time view criteria for orders: status, symbol, and a row limit.
///
/// The projection orders rows by `update_time` descending before applying
/// the limit, so a bounded view keeps the most recent activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    /// Status criterion
    pub status: StatusFilter,
    /// Restrict to one symbol, when set
    pub symbol: Option<Symbol>,
    /// Maximum rows in the view, when set
    pub limit: Option<usize>,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: StatusFilter::Open,
            symbol: None,
            limit: None,
        }
    }
}

impl EntityFilter<Order> for OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        if !self.status.matches(order.status) {
            return false;
        }
        match &self.symbol {
            Some(symbol) => order.symbol == *symbol,
            None => true,
        }
    }

    fn project(&self, mut rows: Vec<Order>) -> Vec<Order> {
        rows.sort_by(|a, b| b.update_time.cmp(&a.update_time).then(b.order_id.cmp(&a.order_id)));
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use vantage_domain::{OrderSide, OrderStatus, OrderType};

    fn order(id: i64, symbol: &str, status: OrderStatus, update_time: i64) -> Order {
        Order {
            order_id: id,
            symbol: Symbol::new(symbol).unwrap(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status,
            orig_qty: dec!(1),
            executed_qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            price: dec!(100),
            reduce_only: false,
            close_position: false,
            realized_profit: Decimal::ZERO,
            update_time,
        }
    }

    #[test]
    fn test_filter_by_status_and_symbol() {
        let filter = OrderFilter {
            status: StatusFilter::Open,
            symbol: Some(Symbol::new("BTCUSDT").unwrap()),
            limit: None,
        };

        assert!(filter.matches(&order(1, "BTCUSDT", OrderStatus::New, 0)));
        assert!(!filter.matches(&order(2, "BTCUSDT", OrderStatus::Filled, 0)));
        assert!(!filter.matches(&order(3, "ETHUSDT", OrderStatus::New, 0)));
    }

    #[test]
    fn test_projection_newest_first_with_limit() {
        let filter = OrderFilter {
            status: StatusFilter::All,
            symbol: None,
            limit: Some(2),
        };

        let rows = filter.project(vec![
            order(1, "BTCUSDT", OrderStatus::New, 100),
            order(2, "BTCUSDT", OrderStatus::New, 300),
            order(3, "BTCUSDT", OrderStatus::New, 200),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_id, 2);
        assert_eq!(rows[1].order_id, 3);
    }

    #[test]
    fn test_book_ages_terminal_orders_out_of_view() {
        let mut book = OrderBook::new(OrderFilter::default());

        book.apply_snapshot(|_| true, vec![order(1, "BTCUSDT", OrderStatus::New, 100)]);
        assert_eq!(book.view().len(), 1);

        // The order fills via a stream patch: it stays stored but leaves
        // the open-orders view.
        let fill = OrderPatch {
            order_id: 1,
            symbol: Symbol::new("BTCUSDT").unwrap(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::Filled,
            orig_qty: None,
            executed_qty: Some(dec!(1)),
            avg_price: Some(dec!(100)),
            price: None,
            reduce_only: None,
            close_position: None,
            realized_profit: None,
            update_time: Some(200),
        };
        book.apply_patch(&fill);

        assert!(book.view().is_empty());
        assert_eq!(book.len(), 1);
        assert_eq!(book.get(&1).unwrap().status, OrderStatus::Filled);
    }
}
