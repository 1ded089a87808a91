//! Vantage Precision Layer
//!
//! Derives exchange-mandated rounding rules per symbol from exchange
//! metadata and applies them to arbitrary numeric inputs, guaranteeing
//! exchange-legal output. Stateless after load.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod normalize;
pub mod registry;

// Re-exports
pub use normalize::{snap_to_increment, NumericNormalizer};
pub use registry::{
    precision_from_size, ExchangeMetadata, PrecisionRegistry, SymbolFilter, SymbolRecord,
    SymbolRule,
};
