//! Daemon error types.

use thiserror::Error;
use vantage_connectors::ConnectorError;
use vantage_domain::{DomainError, PositionKey};
use vantage_store::StoreError;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Connector error (snapshot fetch or trade action)
    #[error("{0}")]
    Connector(#[from] ConnectorError),

    /// No open position for the requested key
    #[error("No open position for {0}")]
    PositionNotFound(PositionKey),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
