//! HTTP client for the HyperLiquid info endpoint.
//!
//! Provides `meta` (perp universe, used to map symbols to asset ids) and
//! `clearinghouseState` (open positions, used to close them).

use crate::error::{RegistryError, RegistryResult};
use crate::user_state::ClearinghouseStateResponse;
use hlvault_chain::BoxFuture;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const TESTNET_INFO_URL: &str = "https://api.hyperliquid-testnet.xyz/info";
pub const MAINNET_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// Request type for info endpoint.
#[derive(Debug, Serialize)]
struct InfoRequest {
    #[serde(rename = "type")]
    request_type: String,
}

/// Request type for info endpoint with user address.
#[derive(Debug, Serialize)]
struct InfoRequestWithUser {
    #[serde(rename = "type")]
    request_type: String,
    /// User address (0x...).
    user: String,
}

/// Info endpoint access used by the metadata cache and the client.
pub trait InfoSource: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Raw `{"type":"meta"}` response.
    fn fetch_meta(&self) -> BoxFuture<'_, RegistryResult<Value>>;

    fn fetch_clearinghouse_state(
        &self,
        user: String,
    ) -> BoxFuture<'_, RegistryResult<ClearinghouseStateResponse>>;
}

/// Arc wrapper for InfoSource trait objects.
pub type DynInfoSource = Arc<dyn InfoSource>;

/// Client for the info endpoint.
pub struct InfoClient {
    client: Client,
    info_url: String,
}

impl InfoClient {
    /// # Arguments
    /// * `info_url` - e.g. "https://api.hyperliquid.xyz/info"
    /// * `timeout` - per-request timeout
    pub fn new(info_url: impl Into<String>, timeout: Duration) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            info_url: info_url.into(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, request: &T) -> RegistryResult<reqwest::Response> {
        let response = self
            .client
            .post(&self.info_url)
            .json(request)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }
}

impl InfoSource for InfoClient {
    fn endpoint(&self) -> &str {
        &self.info_url
    }

    fn fetch_meta(&self) -> BoxFuture<'_, RegistryResult<Value>> {
        Box::pin(async move {
            info!(url = %self.info_url, "Fetching meta from info endpoint");
            let request = InfoRequest {
                request_type: "meta".to_string(),
            };
            let body: Value = self
                .post(&request)
                .await?
                .json()
                .await
                .map_err(|e| RegistryError::HttpClient(format!("Failed to parse meta: {e}")))?;
            debug!("Raw meta response received");
            Ok(body)
        })
    }

    fn fetch_clearinghouse_state(
        &self,
        user: String,
    ) -> BoxFuture<'_, RegistryResult<ClearinghouseStateResponse>> {
        Box::pin(async move {
            info!(url = %self.info_url, user = %user, "Fetching clearinghouseState");
            let request = InfoRequestWithUser {
                request_type: "clearinghouseState".to_string(),
                user,
            };
            let state: ClearinghouseStateResponse =
                self.post(&request).await?.json().await.map_err(|e| {
                    RegistryError::HttpClient(format!("Failed to parse clearinghouseState: {e}"))
                })?;
            info!(
                positions = state.asset_positions.len(),
                "Fetched clearinghouseState successfully"
            );
            Ok(state)
        })
    }
}

/// Mock info endpoint for tests.
#[derive(Debug, Default)]
pub struct MockInfoSource {
    meta: Mutex<Option<Value>>,
    state: Mutex<ClearinghouseStateResponse>,
    meta_calls: AtomicUsize,
    state_users: Mutex<Vec<String>>,
}

impl MockInfoSource {
    /// Serve `meta` for `{"type":"meta"}`; `None` makes the call fail.
    pub fn with_meta(meta: Option<Value>) -> Self {
        Self {
            meta: Mutex::new(meta),
            ..Self::default()
        }
    }

    pub fn set_meta(&self, meta: Option<Value>) {
        *self.meta.lock() = meta;
    }

    pub fn set_clearinghouse_state(&self, state: ClearinghouseStateResponse) {
        *self.state.lock() = state;
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    /// Users queried through clearinghouseState.
    pub fn state_users(&self) -> Vec<String> {
        self.state_users.lock().clone()
    }
}

impl InfoSource for MockInfoSource {
    fn endpoint(&self) -> &str {
        "mock://info"
    }

    fn fetch_meta(&self) -> BoxFuture<'_, RegistryResult<Value>> {
        Box::pin(async move {
            self.meta_calls.fetch_add(1, Ordering::SeqCst);
            self.meta
                .lock()
                .clone()
                .ok_or_else(|| RegistryError::HttpClient("HTTP 503: unavailable".to_string()))
        })
    }

    fn fetch_clearinghouse_state(
        &self,
        user: String,
    ) -> BoxFuture<'_, RegistryResult<ClearinghouseStateResponse>> {
        Box::pin(async move {
            self.state_users.lock().push(user);
            Ok(self.state.lock().clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_request_serialization() {
        let request = InfoRequest {
            request_type: "meta".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"meta"}"#);

        let request = InfoRequestWithUser {
            request_type: "clearinghouseState".to_string(),
            user: "0xabc".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"clearinghouseState","user":"0xabc"}"#);
    }

    #[tokio::test]
    async fn test_mock_counts_meta_calls() {
        let source = MockInfoSource::with_meta(None);
        assert!(source.fetch_meta().await.is_err());
        assert_eq!(source.meta_calls(), 1);
    }
}
