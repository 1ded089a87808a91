//! Vantage Daemon
//!
//! Runtime wiring for the market state engine: configuration, the
//! application context owning the stores, and the stream/poll workers that
//! feed it.

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod market_state;
pub mod view;

pub use config::{Config, Environment};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use market_state::MarketState;
pub use view::{OrderRow, PositionRow};
