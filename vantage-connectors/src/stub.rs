//! Stub implementations for testing.
//!
//! These implementations simulate the snapshot and trade-action
//! collaborators without making real API calls.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::RwLock;

use vantage_domain::{Order, Position, Side, Symbol};
use vantage_precision::ExchangeMetadata;

use crate::error::ConnectorError;
use crate::ports::{CloseOutcome, OrderQuery, SnapshotSource, TradeActions};

// =============================================================================
// Stub snapshot source
// =============================================================================

/// Stub snapshot source for testing.
///
/// Serves whatever orders/positions/metadata were set on it, with optional
/// one-shot failure injection.
pub struct StubSnapshotSource {
    metadata: RwLock<ExchangeMetadata>,
    orders: RwLock<Vec<Order>>,
    positions: RwLock<Vec<Position>>,
    /// Whether to simulate a failure on the next fetch
    fail_next: RwLock<bool>,
    /// Fetch counters (metadata, orders, positions)
    fetches: RwLock<(usize, usize, usize)>,
}

impl StubSnapshotSource {
    /// Create an empty stub source.
    pub fn new() -> Self {
        Self {
            metadata: RwLock::new(ExchangeMetadata::default()),
            orders: RwLock::new(Vec::new()),
            positions: RwLock::new(Vec::new()),
            fail_next: RwLock::new(false),
            fetches: RwLock::new((0, 0, 0)),
        }
    }

    /// Set the metadata the next fetch returns.
    pub fn set_metadata(&self, metadata: ExchangeMetadata) {
        *self.metadata.write().unwrap() = metadata;
    }

    /// Set the orders the next fetch returns (pre-filtered by the caller's
    /// intended query).
    pub fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.write().unwrap() = orders;
    }

    /// Set the positions the next fetch returns.
    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.write().unwrap() = positions;
    }

    /// Configure the next fetch to fail.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().unwrap() = fail;
    }

    /// Number of position fetches served.
    pub fn position_fetches(&self) -> usize {
        self.fetches.read().unwrap().2
    }

    /// Check if we should fail the next operation.
    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().unwrap();
        let fail = *fail_next;
        *fail_next = false; // Reset after check
        fail
    }
}

impl Default for StubSnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSource for StubSnapshotSource {
    async fn fetch_exchange_metadata(&self) -> Result<ExchangeMetadata, ConnectorError> {
        if self.should_fail() {
            return Err(ConnectorError::RequestFailed("simulated metadata failure".to_string()));
        }
        self.fetches.write().unwrap().0 += 1;
        Ok(self.metadata.read().unwrap().clone())
    }

    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, ConnectorError> {
        if self.should_fail() {
            return Err(ConnectorError::RequestFailed("simulated order fetch failure".to_string()));
        }
        self.fetches.write().unwrap().1 += 1;

        let mut orders: Vec<Order> = self
            .orders
            .read()
            .unwrap()
            .iter()
            .filter(|order| query.covers(order))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>, ConnectorError> {
        if self.should_fail() {
            return Err(ConnectorError::RequestFailed(
                "simulated position fetch failure".to_string(),
            ));
        }
        self.fetches.write().unwrap().2 += 1;
        Ok(self.positions.read().unwrap().clone())
    }
}

// =============================================================================
// Stub trade actions
// =============================================================================

/// Stub trade-action port for testing.
///
/// Accepts every close unless a rejection message is configured.
pub struct StubTradeActions {
    /// Rejection for the next close, if set
    reject_next: RwLock<Option<String>>,
    /// Closes accepted so far
    closed: RwLock<Vec<(Symbol, Side, Decimal)>>,
    /// Order counter for generating ids
    order_counter: RwLock<i64>,
}

impl StubTradeActions {
    /// Create a stub that accepts every close.
    pub fn new() -> Self {
        Self {
            reject_next: RwLock::new(None),
            closed: RwLock::new(Vec::new()),
            order_counter: RwLock::new(0),
        }
    }

    /// Configure the next close to be rejected with the given message.
    pub fn set_reject_next(&self, msg: impl Into<String>) {
        *self.reject_next.write().unwrap() = Some(msg.into());
    }

    /// Closes accepted so far.
    pub fn closed(&self) -> Vec<(Symbol, Side, Decimal)> {
        self.closed.read().unwrap().clone()
    }

    fn next_order_id(&self) -> i64 {
        let mut counter = self.order_counter.write().unwrap();
        *counter += 1;
        *counter
    }
}

impl Default for StubTradeActions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeActions for StubTradeActions {
    async fn close_position(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Result<CloseOutcome, ConnectorError> {
        if let Some(msg) = self.reject_next.write().unwrap().take() {
            return Err(ConnectorError::Api { code: -2022, msg });
        }

        self.closed.write().unwrap().push((symbol.clone(), side, quantity));

        let order_id = self.next_order_id();
        Ok(CloseOutcome {
            order_id,
            client_order_id: format!("stub-{}", order_id),
            symbol: symbol.clone(),
            side,
            accepted_at: Utc::now(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
