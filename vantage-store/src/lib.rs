//! Vantage Storage Layer
//!
//! A generic reconciling cache for mutable trading entities. One store
//! instance owns one canonical, deduplicated collection keyed by a stable
//! identity, built from two independent inputs that may arrive interleaved:
//!
//! - **Snapshot source**: a full or filtered pull returning the complete set
//!   of entities for its criteria. Applying a snapshot replaces the subset
//!   the fetch covered and leaves everything outside that scope untouched.
//! - **Stream source**: an unordered sequence of partial-update patches.
//!   A patch for an unseen key creates the entity; a patch for a known key
//!   overwrites exactly the fields it carries (arrival order wins).
//!
//! Consumers read cloned, filtered views — never the backing collection —
//! and may register at most one notification subscriber per store.
//!
//! # Usage
//!
//! ```rust
//! use vantage_store::{OrderBook, OrderFilter};
//! use vantage_domain::StatusFilter;
//!
//! let mut book = OrderBook::new(OrderFilter::default());
//! book.set_filter(OrderFilter { status: StatusFilter::Open, symbol: None, limit: Some(25) });
//! assert!(book.view().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Modules
mod error;
mod orders;
mod positions;
mod store;

// Re-exports
pub use error::StoreError;
pub use orders::{OrderBook, OrderFilter};
pub use positions::{PositionBook, PositionFilter};
pub use store::{Applied, EntityFilter, EntityPatch, EntityStore, StoreEntity, StoreEvent};
