//! Vantage Valuation Engine
//!
//! Recomputes derived position fields (unrealized PnL, percent return) from
//! scratch on every mark-price tick. Pure logic, zero I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod valuation;

pub use valuation::{revalue, LiveValuationEngine, Valuation};
