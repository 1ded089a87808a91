//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A notification subscriber is already registered
    #[error("A subscriber is already registered for this {kind} store")]
    AlreadySubscribed {
        /// Entity kind of the store (order, position)
        kind: &'static str,
    },
}
