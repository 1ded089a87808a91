//! Connector port definitions.
//!
//! Ports define the interfaces for the external collaborators the engine
//! depends on. Adapters implement these ports for specific services
//! (Binance futures, stubs for tests). Network timeouts belong to the
//! adapters — the engine only sees a success/failure result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vantage_domain::{Order, Position, Side, StatusFilter, Symbol};
use vantage_precision::ExchangeMetadata;

use crate::error::ConnectorError;

// =============================================================================
// Snapshot source
// =============================================================================

/// Criteria for an order snapshot fetch.
///
/// The same criteria describe the fetch's scope when the result is merged:
/// an order matches the query when its status and symbol satisfy them.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Status criterion
    pub status: StatusFilter,
    /// Restrict to one symbol, when set
    pub symbol: Option<Symbol>,
    /// Maximum rows to fetch, when set
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Whether an order falls inside this query's scope.
    pub fn covers(&self, order: &Order) -> bool {
        if !self.status.matches(order.status) {
            return false;
        }
        match &self.symbol {
            Some(symbol) => order.symbol == *symbol,
            None => true,
        }
    }
}

/// Port for pull-based snapshots of exchange state.
///
/// Implementations:
/// - `BinanceRestClient` — USDⓈ-M futures REST API
/// - `StubSnapshotSource` — for tests (settable responses, failure injection)
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch exchange metadata (symbol records with filter lists).
    async fn fetch_exchange_metadata(&self) -> Result<ExchangeMetadata, ConnectorError>;

    /// Fetch the complete set of orders matching the query.
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, ConnectorError>;

    /// Fetch all open positions (full pull, both hedge-mode sides).
    async fn fetch_positions(&self) -> Result<Vec<Position>, ConnectorError>;
}

// =============================================================================
// Trade actions
// =============================================================================

/// Result of an accepted close-position request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseOutcome {
    /// Exchange-assigned order id of the closing order
    pub order_id: i64,
    /// Client-provided order id (for idempotency)
    pub client_order_id: String,
    /// Symbol the close was for
    pub symbol: Symbol,
    /// Position side that was closed
    pub side: Side,
    /// When the exchange accepted the request
    pub accepted_at: DateTime<Utc>,
}

/// Port for outbound trading actions.
///
/// The engine sends a close request and reconciles afterwards with a fresh
/// snapshot; a rejection is surfaced verbatim and never retried here.
#[async_trait]
pub trait TradeActions: Send + Sync {
    /// Close the `(symbol, side)` position with a reduce-only market order
    /// for `quantity`.
    async fn close_position(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Result<CloseOutcome, ConnectorError>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vantage_domain::{OrderSide, OrderStatus, OrderType};

    fn order(symbol: &str, status: OrderStatus) -> Order {
        Order {
            order_id: 1,
            symbol: Symbol::new(symbol).unwrap(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status,
            orig_qty: dec!(1),
            executed_qty: dec!(0),
            avg_price: dec!(0),
            price: dec!(100),
            reduce_only: false,
            close_position: false,
            realized_profit: dec!(0),
            update_time: 0,
        }
    }

    #[test]
    fn test_query_scope() {
        let query = OrderQuery {
            status: StatusFilter::Open,
            symbol: Some(Symbol::new("BTCUSDT").unwrap()),
            limit: Some(50),
        };

        assert!(query.covers(&order("BTCUSDT", OrderStatus::New)));
        assert!(!query.covers(&order("BTCUSDT", OrderStatus::Filled)));
        assert!(!query.covers(&order("ETHUSDT", OrderStatus::New)));
    }

    #[test]
    fn test_default_query_covers_open_orders_everywhere() {
        let query = OrderQuery::default();
        assert!(query.covers(&order("ETHUSDT", OrderStatus::PartiallyFilled)));
        assert!(!query.covers(&order("ETHUSDT", OrderStatus::Canceled)));
    }

    #[test]
    fn test_close_outcome_serialization() {
        let outcome = CloseOutcome {
            order_id: 12345,
            client_order_id: "abc-123".to_string(),
            symbol: Symbol::new("BTCUSDT").unwrap(),
            side: Side::Long,
            accepted_at: Utc::now(),
        };

        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: CloseOutcome = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.order_id, 12345);
        assert_eq!(parsed.side, Side::Long);
    }
}
