//! Connector errors.
//!
//! One taxonomy for both transports: the engine treats every variant as
//! recoverable and keeps serving last-known-good state.

use thiserror::Error;

/// Errors that can occur in the exchange connectors.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// Failed to build request signature
    #[error("Failed to build signature: {0}")]
    Signature(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Exchange API returned an error payload
    #[error("Exchange API error: {code} - {msg}")]
    Api {
        /// Exchange error code
        code: i64,
        /// Exchange error message, verbatim
        msg: String,
    },

    /// Failed to parse a response or stream frame
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Request or read timed out
    #[error("Request timed out")]
    Timeout,

    /// Invalid parameter for the requested call
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// WebSocket connection failed or closed unexpectedly
    #[error("Stream connection error: {0}")]
    Connection(String),
}
