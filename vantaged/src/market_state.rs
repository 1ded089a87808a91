//! Market state: the application context owning the engine's stores.
//!
//! One `MarketState` instance owns the precision registry, the order and
//! position books, and the valuation engine as explicit instances — no
//! globals — and is driven by a single task, so all store mutation happens
//! on one logical thread of control. Stream events keep flowing while a
//! snapshot fetch is outstanding; the scoped snapshot merge is what makes
//! that interleaving safe.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use vantage_connectors::{
    CloseOutcome, OrderQuery, SnapshotSource, StreamMessage, TradeActions,
};
use vantage_domain::{MarkPriceTick, Order, Position, PositionKey, Side, Symbol};
use vantage_engine::LiveValuationEngine;
use vantage_precision::{NumericNormalizer, PrecisionRegistry};
use vantage_store::{
    OrderBook, OrderFilter, PositionBook, PositionFilter, StoreError, StoreEvent,
};

use crate::error::{DaemonError, DaemonResult};
use crate::view::{OrderRow, PositionRow};

/// Notification receiver for a store's events.
pub type Subscription<E> = tokio::sync::mpsc::UnboundedReceiver<StoreEvent<E>>;

/// The market state engine context.
pub struct MarketState<S: SnapshotSource, T: TradeActions> {
    /// Snapshot collaborator
    snapshots: Arc<S>,
    /// Trade-action collaborator
    actions: Arc<T>,
    /// Per-symbol precision rules
    registry: PrecisionRegistry,
    /// Display normalization
    normalizer: NumericNormalizer,
    /// Derived-field recomputation
    valuation: LiveValuationEngine,
    /// Canonical order collection
    orders: OrderBook,
    /// Canonical position collection
    positions: PositionBook,
    /// Criteria for order snapshot fetches (also the merge scope)
    order_query: OrderQuery,
}

impl<S: SnapshotSource, T: TradeActions> MarketState<S, T> {
    /// Create a market state context.
    pub fn new(snapshots: Arc<S>, actions: Arc<T>, order_limit: usize) -> Self {
        let order_query = OrderQuery {
            limit: Some(order_limit),
            ..OrderQuery::default()
        };
        let order_filter = OrderFilter {
            status: order_query.status,
            symbol: order_query.symbol.clone(),
            limit: order_query.limit,
        };

        Self {
            snapshots,
            actions,
            registry: PrecisionRegistry::new(),
            normalizer: NumericNormalizer::new(),
            valuation: LiveValuationEngine::new(),
            orders: OrderBook::new(order_filter),
            positions: PositionBook::new(PositionFilter::default()),
            order_query,
        }
    }

    // =========================================================================
    // Bootstrap and snapshots
    // =========================================================================

    /// Load metadata and take initial snapshots.
    pub async fn bootstrap(&mut self) -> DaemonResult<()> {
        self.refresh_metadata().await?;
        self.refresh_orders().await?;
        self.refresh_positions().await?;
        info!(
            rules = self.registry.len(),
            orders = self.orders.len(),
            positions = self.positions.len(),
            "market state bootstrapped"
        );
        Ok(())
    }

    /// Reload precision rules from exchange metadata.
    pub async fn refresh_metadata(&mut self) -> DaemonResult<()> {
        let metadata = self.snapshots.fetch_exchange_metadata().await?;
        self.registry.load(&metadata);
        debug!(rules = self.registry.len(), "precision rules loaded");
        Ok(())
    }

    /// Fetch and merge an order snapshot for the current query.
    ///
    /// A failed fetch surfaces the error and leaves the book untouched:
    /// stale-but-present beats empty.
    pub async fn refresh_orders(&mut self) -> DaemonResult<usize> {
        let query = self.order_query.clone();
        let rows = match self.snapshots.fetch_orders(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "order snapshot failed, keeping last known state");
                return Err(err.into());
            }
        };

        let count = rows.len();
        self.orders.apply_snapshot(|order| query.covers(order), rows);
        Ok(count)
    }

    /// Fetch and merge a position snapshot (full pull).
    ///
    /// Mark prices survive the merge: the snapshot carries authoritative
    /// entry data only, so each symbol's last known mark is re-applied to
    /// rebuild the derived fields afterwards.
    pub async fn refresh_positions(&mut self) -> DaemonResult<usize> {
        let rows = match self.snapshots.fetch_positions().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "position snapshot failed, keeping last known state");
                return Err(err.into());
            }
        };

        // Remember marks before the replace
        let mut marks: HashMap<Symbol, Decimal> = HashMap::new();
        for position in self.positions.all() {
            if !position.mark_price.is_zero() {
                marks.insert(position.symbol.clone(), position.mark_price);
            }
        }

        let count = rows.len();
        self.positions.apply_snapshot(|_| true, rows);

        for (symbol, mark) in marks {
            let tick = MarkPriceTick { symbol, mark_price: mark, event_time: 0 };
            self.valuation.apply_mark_price(&mut self.positions, &tick);
        }

        Ok(count)
    }

    // =========================================================================
    // Stream input
    // =========================================================================

    /// Route one stream message into the stores.
    ///
    /// Unrecognized kinds are a guaranteed no-op; unmappable payloads are
    /// logged and dropped rather than crashing the stream.
    pub fn handle_stream_message(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::OrderUpdate(event) => match event.to_patch() {
                Ok(patch) => {
                    self.orders.apply_patch(&patch);
                }
                Err(err) => warn!(%err, "dropping unmappable order update"),
            },
            StreamMessage::AccountUpdate(event) => {
                for patch in event.position_patches() {
                    self.positions.apply_patch(&patch);
                }
            }
            StreamMessage::MarkPrice(event) => match event.to_tick() {
                Ok(tick) => {
                    self.valuation.apply_mark_price(&mut self.positions, &tick);
                }
                Err(err) => warn!(%err, "dropping unmappable mark price update"),
            },
            StreamMessage::Ignored => {}
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Close the `(symbol, side)` position.
    ///
    /// The stored quantity is normalized to the symbol's step grid before
    /// the request goes out. On success a fresh position snapshot
    /// reconciles the books; on failure the upstream error is surfaced
    /// verbatim and nothing is retried.
    pub async fn close_position(
        &mut self,
        symbol: &Symbol,
        side: Side,
    ) -> DaemonResult<CloseOutcome> {
        let key = PositionKey { symbol: symbol.clone(), side };
        let position = self
            .positions
            .get(&key)
            .filter(Position::is_open)
            .ok_or(DaemonError::PositionNotFound(key))?;

        let quantity =
            self.normalizer.normalize_quantity(&self.registry, symbol, position.quantity);

        let outcome = self.actions.close_position(symbol, side, quantity).await?;
        info!(%symbol, %side, order_id = outcome.order_id, "close accepted, reconciling");

        if let Err(err) = self.refresh_positions().await {
            warn!(%err, "close accepted but reconcile snapshot failed");
        }

        Ok(outcome)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Replace the order view criteria.
    ///
    /// Changes what reads and the next snapshot poll project; it does not
    /// itself trigger a fetch.
    pub fn set_order_filter(&mut self, filter: OrderFilter) {
        self.order_query = OrderQuery {
            status: filter.status,
            symbol: filter.symbol.clone(),
            limit: filter.limit,
        };
        self.orders.set_filter(filter);
    }

    /// Replace the position view criteria.
    pub fn set_position_filter(&mut self, filter: PositionFilter) {
        self.positions.set_filter(filter);
    }

    /// Subscribe to order store notifications (single subscriber).
    pub fn subscribe_orders(&mut self) -> Result<Subscription<Order>, StoreError> {
        self.orders.subscribe()
    }

    /// Subscribe to position store notifications (single subscriber).
    pub fn subscribe_positions(&mut self) -> Result<Subscription<Position>, StoreError> {
        self.positions.subscribe()
    }

    /// Cancel the order store subscription.
    pub fn unsubscribe_orders(&mut self) {
        self.orders.unsubscribe()
    }

    /// Cancel the position store subscription.
    pub fn unsubscribe_positions(&mut self) {
        self.positions.unsubscribe()
    }

    /// The filtered order view, display-normalized.
    pub fn order_rows(&self) -> Vec<OrderRow> {
        self.orders
            .view()
            .into_iter()
            .map(|order| OrderRow::from_order(&order, &self.registry, &self.normalizer))
            .collect()
    }

    /// The filtered position view, display-normalized.
    pub fn position_rows(&self) -> Vec<PositionRow> {
        self.positions
            .view()
            .into_iter()
            .map(|position| PositionRow::from_position(&position, &self.registry, &self.normalizer))
            .collect()
    }

    /// Direct access to the order book (tests, workers).
    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    /// Direct access to the position book (tests, workers).
    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// The precision registry.
    pub fn registry(&self) -> &PrecisionRegistry {
        &self.registry
    }
}
