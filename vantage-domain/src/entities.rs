//! Domain Entities for Vantage
//!
//! Orders and positions as stored by the market state engine, plus the
//! field-level patch types that stream events carry. A patch names an
//! entity's identity and the changed fields; every field present on a patch
//! overwrites the stored value (arrival order wins).

use crate::value_objects::{OrderSide, OrderStatus, OrderType, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Order
// =============================================================================

/// An exchange order as known to the engine.
///
/// Created by a snapshot fetch or by a stream event for an unseen id,
/// mutated in place by later stream events for the same id, and never
/// deleted by stream events within a session — terminal orders age out of
/// display through view filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned order id (unique, stable)
    pub order_id: i64,
    /// Trading pair
    pub symbol: Symbol,
    /// Buy or sell
    pub side: OrderSide,
    /// Order type (limit, market, stop, ...)
    pub order_type: OrderType,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Original order quantity
    pub orig_qty: Decimal,
    /// Cumulative filled quantity
    pub executed_qty: Decimal,
    /// Average fill price (zero until first fill)
    pub avg_price: Decimal,
    /// Limit price (zero for market orders)
    pub price: Decimal,
    /// Order may only reduce an existing position
    pub reduce_only: bool,
    /// Order closes the whole position when triggered
    pub close_position: bool,
    /// Realized profit attributed to this order's fills
    pub realized_profit: Decimal,
    /// Last update time (exchange epoch milliseconds)
    pub update_time: i64,
}

/// Field-level patch for an order, as delivered by a stream event.
///
/// Identity and lifecycle fields are always present on the wire; the rest
/// overwrite the stored order only when the event carries them.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPatch {
    /// Exchange order id this patch refers to
    pub order_id: i64,
    /// Trading pair
    pub symbol: Symbol,
    /// Buy or sell
    pub side: OrderSide,
    /// Order type
    pub order_type: OrderType,
    /// Lifecycle status after the event
    pub status: OrderStatus,
    /// Original quantity, when carried
    pub orig_qty: Option<Decimal>,
    /// Cumulative filled quantity, when carried
    pub executed_qty: Option<Decimal>,
    /// Average fill price, when carried
    pub avg_price: Option<Decimal>,
    /// Limit price, when carried
    pub price: Option<Decimal>,
    /// Reduce-only flag, when carried
    pub reduce_only: Option<bool>,
    /// Close-position flag, when carried
    pub close_position: Option<bool>,
    /// Realized profit delta-bearing fills report the running total
    pub realized_profit: Option<Decimal>,
    /// Event time (exchange epoch milliseconds)
    pub update_time: Option<i64>,
}

impl OrderPatch {
    /// Materialize a new order from this patch (unseen id path).
    ///
    /// Fields the event did not carry start at their zero values.
    pub fn into_order(&self) -> Order {
        Order {
            order_id: self.order_id,
            symbol: self.symbol.clone(),
            side: self.side,
            order_type: self.order_type,
            status: self.status,
            orig_qty: self.orig_qty.unwrap_or(Decimal::ZERO),
            executed_qty: self.executed_qty.unwrap_or(Decimal::ZERO),
            avg_price: self.avg_price.unwrap_or(Decimal::ZERO),
            price: self.price.unwrap_or(Decimal::ZERO),
            reduce_only: self.reduce_only.unwrap_or(false),
            close_position: self.close_position.unwrap_or(false),
            realized_profit: self.realized_profit.unwrap_or(Decimal::ZERO),
            update_time: self.update_time.unwrap_or(0),
        }
    }

    /// Overwrite-merge this patch into a stored order.
    pub fn apply_to(&self, order: &mut Order) {
        order.symbol = self.symbol.clone();
        order.side = self.side;
        order.order_type = self.order_type;
        order.status = self.status;
        if let Some(qty) = self.orig_qty {
            order.orig_qty = qty;
        }
        if let Some(qty) = self.executed_qty {
            order.executed_qty = qty;
        }
        if let Some(price) = self.avg_price {
            order.avg_price = price;
        }
        if let Some(price) = self.price {
            order.price = price;
        }
        if let Some(flag) = self.reduce_only {
            order.reduce_only = flag;
        }
        if let Some(flag) = self.close_position {
            order.close_position = flag;
        }
        if let Some(profit) = self.realized_profit {
            order.realized_profit = profit;
        }
        if let Some(ts) = self.update_time {
            order.update_time = ts;
        }
    }
}

// =============================================================================
// Position
// =============================================================================

/// Identity of a position: one per `(symbol, side)` pair.
///
/// Hedge mode allows a LONG and a SHORT position on the same symbol at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    /// Trading pair
    pub symbol: Symbol,
    /// Position direction
    pub side: Side,
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.side)
    }
}

/// An open position as known to the engine.
///
/// `quantity`, `entry_price`, `margin`, `leverage`, `stop_loss` and
/// `take_profit` are authoritative from the snapshot/stream source.
/// `mark_price`, `pnl` and `pnl_percent` are derived display fields,
/// recomputed from scratch on every mark-price tick — they are never
/// accepted as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Trading pair
    pub symbol: Symbol,
    /// Position direction
    pub side: Side,
    /// Position size (always non-negative; direction lives in `side`)
    pub quantity: Decimal,
    /// Average entry price
    pub entry_price: Decimal,
    /// Margin allocated to the position
    pub margin: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
    /// Stop-loss trigger price, if set
    pub stop_loss: Option<Decimal>,
    /// Take-profit trigger price, if set
    pub take_profit: Option<Decimal>,
    /// Latest mark price applied (derived)
    pub mark_price: Decimal,
    /// Unrealized PnL at the latest mark (derived)
    pub pnl: Decimal,
    /// Unrealized PnL as a percentage of notional (derived)
    pub pnl_percent: Decimal,
}

impl Position {
    /// The position's identity
    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            side: self.side,
        }
    }

    /// Whether the position currently has size
    pub fn is_open(&self) -> bool {
        !self.quantity.is_zero()
    }
}

/// Field-level patch for a position, as delivered by a stream event.
///
/// A patch can never name the derived fields — valuation owns those.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPatch {
    /// Trading pair
    pub symbol: Symbol,
    /// Position direction
    pub side: Side,
    /// New position size, when carried
    pub quantity: Option<Decimal>,
    /// New entry price, when carried
    pub entry_price: Option<Decimal>,
    /// New margin, when carried
    pub margin: Option<Decimal>,
    /// New leverage, when carried
    pub leverage: Option<u32>,
    /// New stop-loss trigger, when carried
    pub stop_loss: Option<Decimal>,
    /// New take-profit trigger, when carried
    pub take_profit: Option<Decimal>,
}

impl PositionPatch {
    /// The identity this patch refers to
    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            side: self.side,
        }
    }

    /// Materialize a new position from this patch (unseen key path).
    ///
    /// Derived fields start at zero and stay there until the first mark tick.
    pub fn into_position(&self) -> Position {
        Position {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity.unwrap_or(Decimal::ZERO),
            entry_price: self.entry_price.unwrap_or(Decimal::ZERO),
            margin: self.margin.unwrap_or(Decimal::ZERO),
            leverage: self.leverage.unwrap_or(1),
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            mark_price: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
        }
    }

    /// Overwrite-merge this patch into a stored position.
    ///
    /// Leaves `mark_price`, `pnl` and `pnl_percent` untouched.
    pub fn apply_to(&self, position: &mut Position) {
        if let Some(qty) = self.quantity {
            position.quantity = qty;
        }
        if let Some(price) = self.entry_price {
            position.entry_price = price;
        }
        if let Some(margin) = self.margin {
            position.margin = margin;
        }
        if let Some(leverage) = self.leverage {
            position.leverage = leverage;
        }
        if let Some(stop) = self.stop_loss {
            position.stop_loss = Some(stop);
        }
        if let Some(target) = self.take_profit {
            position.take_profit = Some(target);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
