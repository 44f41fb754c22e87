//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// JSON-RPC code for "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC code for "invalid params".
pub const INVALID_PARAMS: i64 = -32602;

/// Errors that can occur during an RPC call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, unreadable body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Retry budget spent; wraps the last failure.
    #[error("{method} failed after {attempts} attempts: {last}")]
    Exhausted {
        method: String,
        attempts: u32,
        last: Box<TransportError>,
    },

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and the call may be retried.
    ///
    /// Protocol errors other than the "unsupported" codes are retried too;
    /// they only become fatal once the budget is spent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } | Self::Deserialization(_) => true,
            Self::Rpc(err) => !is_unsupported_code(err.code),
            Self::Exhausted { .. } | Self::Other(_) => false,
        }
    }

    /// Returns `true` if the node reported the method or its params as unsupported.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Rpc(err) if is_unsupported_code(err.code))
    }
}

/// `-32601` / `-32602` mean "this endpoint can't do that" rather than "try again".
pub fn is_unsupported_code(code: i64) -> bool {
    code == METHOD_NOT_FOUND || code == INVALID_PARAMS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_err(code: i64) -> TransportError {
        TransportError::Rpc(JsonRpcError {
            code,
            message: "boom".into(),
            data: None,
        })
    }

    #[test]
    fn unsupported_codes_are_not_retryable() {
        assert!(rpc_err(METHOD_NOT_FOUND).is_unsupported());
        assert!(rpc_err(INVALID_PARAMS).is_unsupported());
        assert!(!rpc_err(METHOD_NOT_FOUND).is_retryable());
    }

    #[test]
    fn other_rpc_errors_retry() {
        let err = rpc_err(-32000);
        assert!(!err.is_unsupported());
        assert!(err.is_retryable());
        assert!(TransportError::Http("reset".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
    }
}
