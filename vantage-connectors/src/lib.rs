//! Vantage Exchange Connectors
//!
//! Adapters for the exchange APIs (REST snapshots + WebSocket stream),
//! the port traits the engine consumes them through, and stub
//! implementations for tests. Normalizes exchange-specific types to
//! domain types at the boundary.

#![warn(clippy::all)]

// Public modules
pub mod binance_rest;
pub mod binance_ws;
pub mod error;
pub mod ports;
pub mod stub;

// Re-exports
pub use binance_rest::BinanceRestClient;
pub use binance_ws::{
    parse_stream_message, AccountUpdateEvent, BinanceStreamClient, MarkPriceEvent,
    OrderTradeUpdateEvent, StreamMessage,
};
pub use error::ConnectorError;
pub use ports::{CloseOutcome, OrderQuery, SnapshotSource, TradeActions};
pub use stub::{StubSnapshotSource, StubTradeActions};
