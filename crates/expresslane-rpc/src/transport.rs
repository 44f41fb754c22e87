//! The `RpcTransport` trait: the seam between the scanner and the wire.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Sends a single JSON-RPC request and returns the raw response.
///
/// Implementations make exactly one attempt; retrying and id assignment
/// belong to [`crate::RpcClient`].
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's identifier (URL or dataset path).
    fn url(&self) -> &str;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Box<T> {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        (**self).send(req).await
    }

    fn url(&self) -> &str {
        (**self).url()
    }
}
