//! Value Objects for the Vantage Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Symbol must be a non-empty exchange pair string
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Order status string not part of the known lifecycle
    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    /// Side string is neither LONG nor SHORT
    #[error("Unknown position side: {0}")]
    UnknownSide(String),
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol is an exchange trading-pair identifier (e.g., "BTCUSDT").
///
/// Precision metadata, position keys, and stream routing are all keyed by the
/// raw exchange string, so the symbol is kept as-is rather than split into
/// base/quote.
///
/// # Invariants
/// - Non-empty
/// - ASCII alphanumeric, stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if empty or not alphanumeric
    pub fn new(pair: impl Into<String>) -> Result<Self, DomainError> {
        let pair = pair.into();
        if pair.is_empty() {
            return Err(DomainError::InvalidSymbol("empty symbol".to_string()));
        }
        if !pair.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidSymbol(pair));
        }
        Ok(Self(pair.to_ascii_uppercase()))
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Side
// =============================================================================

/// Side represents the position direction.
///
/// In hedge mode a LONG and a SHORT position may coexist on one symbol;
/// `(Symbol, Side)` is therefore the position identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Long position (profits when price rises)
    Long,
    /// Short position (profits when price falls)
    Short,
}

impl Side {
    /// Parse an exchange side string ("LONG"/"SHORT")
    ///
    /// # Errors
    /// Returns `DomainError::UnknownSide` for anything else
    pub fn from_exchange(s: &str) -> Result<Self, DomainError> {
        match s {
            "LONG" => Ok(Side::Long),
            "SHORT" => Ok(Side::Short),
            other => Err(DomainError::UnknownSide(other.to_string())),
        }
    }

    /// The order side that closes a position of this side
    ///
    /// Long → Sell, Short → Buy
    pub fn closing_order_side(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// OrderStatus
// =============================================================================

/// Order status lifecycle.
///
/// Terminal states are never left once entered; non-terminal orders are the
/// "open" set a dashboard polls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted by the exchange, nothing filled yet
    New,
    /// Some quantity filled, remainder still working
    PartiallyFilled,
    /// Completely filled
    Filled,
    /// Cancelled before completion
    Canceled,
    /// Expired by the exchange
    Expired,
    /// Rejected by the exchange
    Rejected,
}

impl OrderStatus {
    /// Whether this status is terminal (the order will never change again)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected
        )
    }

    /// Whether the order is still working on the exchange
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Parse an exchange status string
    ///
    /// # Errors
    /// Returns `DomainError::UnknownOrderStatus` for unrecognized strings
    pub fn from_exchange(s: &str) -> Result<Self, DomainError> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELED" => Ok(OrderStatus::Canceled),
            "EXPIRED" => Ok(OrderStatus::Expired),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(DomainError::UnknownOrderStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Order types supported on the futures venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Limit order (price guaranteed)
    Limit,
    /// Market order (immediate execution)
    Market,
    /// Stop-limit order
    Stop,
    /// Stop-market order
    StopMarket,
    /// Take-profit limit order
    TakeProfit,
    /// Take-profit market order
    TakeProfitMarket,
    /// Trailing stop market order
    TrailingStopMarket,
    /// Forced liquidation order
    Liquidation,
}

// =============================================================================
// StatusFilter
// =============================================================================

/// Status criterion for order snapshots and read-time views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Every order regardless of status
    All,
    /// Only non-terminal (working) orders
    #[default]
    Open,
    /// Only terminal orders
    Terminal,
    /// Exactly one status
    Exact(OrderStatus),
}

impl StatusFilter {
    /// Whether a status satisfies this criterion
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => status.is_open(),
            StatusFilter::Terminal => status.is_terminal(),
            StatusFilter::Exact(wanted) => status == *wanted,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
