//! `RpcClient`: retrying JSON-RPC caller over any [`RpcTransport`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

/// JSON-RPC client with a bounded retry budget.
///
/// Request ids start at 1 and increase by one per attempt; the counter belongs
/// to this instance, so two clients never share a sequence.
pub struct RpcClient<T> {
    transport: T,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcClient<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(retry),
            next_id: AtomicU64::new(1),
        }
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The id the next request will carry.
    pub fn peek_id(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    fn take_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call `method` and return its result.
    ///
    /// `Ok(None)` means the endpoint does not support the call (`-32601` /
    /// `-32602`) or answered `null`; callers treat both as "feature absent".
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Option<Value>, TransportError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let req = JsonRpcRequest::new(self.take_id(), method, params.clone());
            let outcome = match self.transport.send(req).await {
                Ok(resp) => resp.into_result().map_err(TransportError::Rpc),
                Err(e) => Err(e),
            };

            let err = match outcome {
                Ok(Value::Null) => return Ok(None),
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_unsupported() => {
                    tracing::debug!(method, error = %e, "method unsupported by endpoint");
                    return Ok(None);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        url = %self.transport.url(),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        method,
                        attempt,
                        error = %err,
                        url = %self.transport.url(),
                        "max retries exceeded"
                    );
                    return Err(TransportError::Exhausted {
                        method: method.to_string(),
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{JsonRpcError, JsonRpcResponse, RpcId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed script of outcomes and records every request id.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<JsonRpcResponse, TransportError>>>,
        seen_ids: Mutex<Vec<RpcId>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<JsonRpcResponse, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                seen_ids: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for Scripted {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.seen_ids.lock().unwrap().push(req.id.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
        }

        fn url(&self) -> &str {
            "scripted"
        }
    }

    fn quick_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn ok(v: serde_json::Value) -> Result<JsonRpcResponse, TransportError> {
        Ok(JsonRpcResponse::success(RpcId::Number(0), v))
    }

    fn rpc_err(code: i64) -> Result<JsonRpcResponse, TransportError> {
        Ok(JsonRpcResponse::failure(RpcId::Number(0), JsonRpcError::new(code, "nope")))
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let client = RpcClient::new(
            Scripted::new(vec![Err(TransportError::Http("reset".into())), ok(json!("0x10"))]),
            quick_retry(3),
        );
        let got = client.call("eth_blockNumber", vec![]).await.unwrap();
        assert_eq!(got, Some(json!("0x10")));
        let ids = client.transport().seen_ids.lock().unwrap().clone();
        assert_eq!(ids, vec![RpcId::Number(1), RpcId::Number(2)]);
    }

    #[tokio::test]
    async fn method_not_found_is_absent_without_retry() {
        let client = RpcClient::new(Scripted::new(vec![rpc_err(-32601)]), quick_retry(3));
        let got = client.call("arb_getRawBlockMetadata", vec![]).await.unwrap();
        assert!(got.is_none());
        assert_eq!(client.transport().seen_ids.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn null_result_is_absent() {
        let client = RpcClient::new(Scripted::new(vec![ok(json!(null))]), quick_retry(0));
        assert!(client.call("eth_getBlockByNumber", vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_error() {
        let client = RpcClient::new(
            Scripted::new(vec![rpc_err(-32000), rpc_err(-32000), rpc_err(-32000)]),
            quick_retry(2),
        );
        let err = client.call("eth_getLogs", vec![]).await.unwrap_err();
        match err {
            TransportError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, TransportError::Rpc(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ids_are_scoped_per_client() {
        let a = RpcClient::new(Scripted::new(vec![ok(json!(1)), ok(json!(2))]), quick_retry(0));
        let b = RpcClient::new(Scripted::new(vec![ok(json!(1))]), quick_retry(0));
        a.call("x", vec![]).await.unwrap();
        a.call("x", vec![]).await.unwrap();
        b.call("x", vec![]).await.unwrap();
        assert_eq!(a.peek_id(), 3);
        assert_eq!(b.peek_id(), 2);
    }
}
