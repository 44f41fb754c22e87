//! expresslane-rpc: JSON-RPC plumbing for the express lane scanner.
//!
//! # Overview
//!
//! - [`RpcTransport`]: one request in, one response out (HTTP or replayed dataset)
//! - [`RpcClient`]: owns a transport, the request-id counter and the retry budget
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`retry`] module: exponential backoff policy

pub mod client;
pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::RpcClient;
pub use error::TransportError;
pub use http::{HttpClientConfig, HttpTransport};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
