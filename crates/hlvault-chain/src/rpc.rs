//! EVM JSON-RPC access.
//!
//! `EvmRpc` is the seam between the client and a node. `JsonRpcChain` talks
//! plain JSON-RPC over reqwest; transactions go out through
//! `eth_sendTransaction`, so signing stays with the node or the middleware in
//! front of it.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ChainError, ChainResult};
use crate::receipt::{hex_string, parse_b256, parse_hex_bytes, parse_hex_u64, TransactionReceipt};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A state-changing call to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

/// Node access needed by the client.
pub trait EvmRpc: Send + Sync {
    /// URL (or label) used in error reports.
    fn endpoint(&self) -> &str;

    fn chain_id(&self) -> BoxFuture<'_, ChainResult<u64>>;

    /// `eth_call` against the latest block.
    fn call(&self, to: Address, data: Bytes) -> BoxFuture<'_, ChainResult<Bytes>>;

    /// `eth_sendTransaction`; resolves to the transaction hash.
    fn send_transaction(&self, request: CallRequest) -> BoxFuture<'_, ChainResult<B256>>;

    /// `eth_getTransactionReceipt`; `None` while pending.
    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> BoxFuture<'_, ChainResult<Option<TransactionReceipt>>>;
}

/// Arc wrapper for EvmRpc trait objects.
pub type DynEvmRpc = Arc<dyn EvmRpc>;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client over HTTP.
#[derive(Clone)]
pub struct JsonRpcChain {
    url: String,
    client: reqwest::Client,
    id: Arc<AtomicU64>,
}

impl JsonRpcChain {
    /// Retries for idempotent reads. Submissions are never retried.
    const MAX_RETRIES: u32 = 3;
    const INITIAL_BACKOFF_MS: u64 = 250;
    const MAX_BACKOFF_MS: u64 = 4_000;

    pub fn new(url: impl Into<String>, timeout: Duration) -> ChainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ChainError::Http {
                method: "client_build".to_string(),
                source,
            })?;
        Ok(Self {
            url: url.into(),
            client,
            id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn request_once(&self, method: &str, params: &Value) -> ChainResult<Value> {
        let id = self.id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params: params.clone(),
            id,
        };
        debug!(method, id, "RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|source| ChainError::Http {
                method: method.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body: JsonRpcResponse = response.json().await.map_err(|source| ChainError::Http {
            method: method.to_string(),
            source,
        })?;

        if let Some(err) = body.error {
            return Err(ChainError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn request(&self, method: &str, params: Value, retries: u32) -> ChainResult<Value> {
        let mut attempt = 0;
        loop {
            match self.request_once(method, &params).await {
                Err(err) if attempt < retries && err.is_transient() => {
                    attempt += 1;
                    let backoff = std::cmp::min(
                        Self::INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1),
                        Self::MAX_BACKOFF_MS,
                    );
                    debug!(method, attempt, backoff_ms = backoff, error = %err, "Retrying RPC request");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                other => return other,
            }
        }
    }
}

impl EvmRpc for JsonRpcChain {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn chain_id(&self) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            let result = self
                .request("eth_chainId", json!([]), Self::MAX_RETRIES)
                .await?;
            let hex = result
                .as_str()
                .ok_or_else(|| ChainError::invalid_response("eth_chainId", "result is not a string"))?;
            parse_hex_u64(hex)
        })
    }

    fn call(&self, to: Address, data: Bytes) -> BoxFuture<'_, ChainResult<Bytes>> {
        Box::pin(async move {
            let params = json!([{ "to": format!("{to:?}"), "data": hex_string(&data) }, "latest"]);
            let result = self.request("eth_call", params, Self::MAX_RETRIES).await?;
            let hex = result
                .as_str()
                .ok_or_else(|| ChainError::invalid_response("eth_call", "result is not a string"))?;
            parse_hex_bytes(hex).map(Bytes::from)
        })
    }

    fn send_transaction(&self, request: CallRequest) -> BoxFuture<'_, ChainResult<B256>> {
        Box::pin(async move {
            let params = json!([{
                "from": format!("{:?}", request.from),
                "to": format!("{:?}", request.to),
                "data": hex_string(&request.data),
            }]);
            let result = self.request("eth_sendTransaction", params, 0).await?;
            let hex = result.as_str().ok_or_else(|| {
                ChainError::invalid_response("eth_sendTransaction", "result is not a string")
            })?;
            parse_b256(hex)
        })
    }

    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> BoxFuture<'_, ChainResult<Option<TransactionReceipt>>> {
        Box::pin(async move {
            let params = json!([hex_string(tx_hash.as_slice())]);
            let result = self
                .request("eth_getTransactionReceipt", params, Self::MAX_RETRIES)
                .await?;
            if result.is_null() {
                return Ok(None);
            }
            TransactionReceipt::from_json(&result).map(Some)
        })
    }
}
