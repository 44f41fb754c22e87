//! Error types for the scan pipeline.

use expresslane_rpc::TransportError;
use thiserror::Error;

/// Errors that can occur while locating, confirming or emitting transactions.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("RPC error: {0}")]
    Rpc(#[from] TransportError),

    /// Invalid invocation; raised before any RPC work.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required call answered "unsupported" or `null`.
    #[error("{method} unavailable on this endpoint")]
    Unavailable { method: String },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns `true` if the error should abort the whole scan rather than one block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_))
    }
}
