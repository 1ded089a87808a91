//! Typed position book: the position instantiation of the generic store.

use crate::store::{EntityFilter, EntityPatch, StoreEntity};
use vantage_domain::{Position, PositionKey, PositionPatch, Symbol};

/// Reconciling cache of positions, keyed by `(symbol, side)`.
pub type PositionBook = crate::store::EntityStore<Position, PositionFilter>;

impl StoreEntity for Position {
    type Key = PositionKey;
    const KIND: &'static str = "position";

    fn key(&self) -> PositionKey {
        Position::key(self)
    }
}

impl EntityPatch for PositionPatch {
    type Entity = Position;

    fn key(&self) -> PositionKey {
        PositionPatch::key(self)
    }

    fn into_entity(&self) -> Position {
        self.into_position()
    }

    fn merge_into(&self, position: &mut Position) {
        self.apply_to(position);
    }
}

/// Read-time view criteria for positions.
///
/// Flat (zero-quantity) positions are hidden by default: a position closed
/// by a stream update stays stored until the next snapshot reconciles it
/// away, but it should not show as an open row in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionFilter {
    /// Restrict to one symbol, when set
    pub symbol: Option<Symbol>,
    /// Include flat positions in the view
    pub include_flat: bool,
}

impl EntityFilter<Position> for PositionFilter {
    fn matches(&self, position: &Position) -> bool {
        if !self.include_flat && !position.is_open() {
            return false;
        }
        match &self.symbol {
            Some(symbol) => position.symbol == *symbol,
            None => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
