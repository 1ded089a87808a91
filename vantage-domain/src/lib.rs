//! Vantage Domain Layer
//!
//! Pure domain types for the market state engine: symbols, sides, orders,
//! positions, and the field-level patches that stream events carry.
//! Zero I/O dependencies.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod market_data;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{Order, OrderPatch, Position, PositionKey, PositionPatch};
pub use market_data::MarkPriceTick;
pub use value_objects::{
    DomainError, OrderSide, OrderStatus, OrderType, Side, StatusFilter, Symbol,
};
