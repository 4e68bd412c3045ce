//! Circle Iris attestation service client.
//!
//! Two endpoints are used:
//! - `GET /v2/burn/USDC/fees/{src}/{dst}`: fee quotes per finality threshold
//! - `GET /v2/messages/{domain}?transactionHash=0x..`: burn message and
//!   attestation once Iris has signed it

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hlvault_chain::BoxFuture;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

pub const IRIS_SANDBOX_URL: &str = "https://iris-api-sandbox.circle.com";
pub const IRIS_MAINNET_URL: &str = "https://iris-api.circle.com";

/// Attestation service access used by the bridge.
pub trait AttestationClient: Send + Sync {
    fn base_url(&self) -> &str;

    /// Raw fee quote response.
    fn fee_quotes(&self, source_domain: u32, destination_domain: u32)
        -> BoxFuture<'_, BridgeResult<Value>>;

    /// Raw messages response; `None` on 404 (not indexed yet).
    fn messages(&self, source_domain: u32, tx_hash: String)
        -> BoxFuture<'_, BridgeResult<Option<Value>>>;
}

pub type DynAttestationClient = Arc<dyn AttestationClient>;

/// Message and attestation pair ready for `receiveUSDCViaCCTPv2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub message: String,
    pub attestation: String,
}

/// Outcome of one messages poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Ready(Attestation),
    /// Records exist but none is complete; carries the last status seen.
    Pending(String),
    Empty,
}

/// Pick the fee in basis points for `finality_threshold`.
///
/// Uses the entry whose `finalityThreshold` matches, else the first entry.
/// `None` when the response has no usable entries.
pub fn select_fee_bps(response: &Value, finality_threshold: u32) -> BridgeResult<Option<u64>> {
    let entries: Vec<&Value> = response
        .as_array()
        .ok_or_else(|| BridgeError::UnexpectedResponse {
            field: "iris_response".to_string(),
            message: format!("expected fee list, got {response}"),
        })?
        .iter()
        .filter(|entry| entry.is_object())
        .collect();

    let Some(first) = entries.first() else {
        return Ok(None);
    };

    let chosen = entries
        .iter()
        .find(|entry| {
            entry
                .get("finalityThreshold")
                .and_then(Value::as_u64)
                .is_some_and(|t| t == u64::from(finality_threshold))
        })
        .unwrap_or(first);

    Ok(Some(chosen.get("minimumFee").map_or(0, json_to_u64)))
}

/// `ceil(units * bps / 10000)`.
pub fn compute_fee(units: u64, bps: u64) -> u64 {
    let fee = (u128::from(units) * u128::from(bps)).div_ceil(10_000);
    u64::try_from(fee).unwrap_or(u64::MAX)
}

fn json_to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Interpret a messages response.
///
/// Records come from `messages` or `data.messages`. A record with a
/// non-empty status other than `complete` is pending; a record needs both
/// `message` and `attestation` strings to be ready.
pub fn extract_attestation(response: &Value) -> PollStatus {
    let records = response
        .get("messages")
        .and_then(Value::as_array)
        .or_else(|| {
            response
                .get("data")
                .and_then(|d| d.get("messages"))
                .and_then(Value::as_array)
        });

    let Some(records) = records else {
        return PollStatus::Empty;
    };

    let mut pending = None;
    for record in records {
        let status = record
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        if !status.is_empty() && status != "complete" {
            pending = Some(status);
            continue;
        }

        if let (Some(message), Some(attestation)) = (
            record.get("message").and_then(Value::as_str),
            record.get("attestation").and_then(Value::as_str),
        ) {
            return PollStatus::Ready(Attestation {
                message: message.to_string(),
                attestation: attestation.to_string(),
            });
        }
    }

    pending.map_or(PollStatus::Empty, PollStatus::Pending)
}

/// reqwest-backed Iris client.
pub struct IrisClient {
    client: Client,
    base_url: String,
}

impl IrisClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BridgeResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Http {
                url: base_url.clone(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    async fn get(&self, url: String) -> BridgeResult<Option<Value>> {
        debug!(url = %url, "Iris request");
        let response = self.client.get(&url).send().await.map_err(|e| BridgeError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BridgeError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.json().await.map(Some).map_err(|e| BridgeError::Http {
            url,
            message: format!("invalid JSON: {e}"),
        })
    }
}

impl AttestationClient for IrisClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fee_quotes(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> BoxFuture<'_, BridgeResult<Value>> {
        Box::pin(async move {
            let url = format!(
                "{}/v2/burn/USDC/fees/{source_domain}/{destination_domain}",
                self.base_url
            );
            self.get(url.clone())
                .await?
                .ok_or(BridgeError::Status { url, status: 404 })
        })
    }

    fn messages(
        &self,
        source_domain: u32,
        tx_hash: String,
    ) -> BoxFuture<'_, BridgeResult<Option<Value>>> {
        Box::pin(async move {
            let url = format!(
                "{}/v2/messages/{source_domain}?transactionHash={tx_hash}",
                self.base_url
            );
            self.get(url).await
        })
    }
}

/// One scripted messages response.
#[derive(Debug, Clone)]
pub enum MockPoll {
    NotFound,
    TransportError,
    Body(Value),
}

/// Scripted attestation service for tests.
///
/// Messages polls pop scripted responses in order; once the script runs out
/// every poll is a 404.
#[derive(Default)]
pub struct MockAttestationClient {
    fees: Mutex<Option<Value>>,
    polls: Mutex<VecDeque<MockPoll>>,
    fee_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    polled: Mutex<Vec<(u32, String)>>,
}

impl MockAttestationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fee response body; `None` makes the quote call fail.
    pub fn set_fees(&self, body: Option<Value>) {
        *self.fees.lock() = body;
    }

    pub fn push_poll(&self, poll: MockPoll) {
        self.polls.lock().push_back(poll);
    }

    pub fn fee_calls(&self) -> usize {
        self.fee_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// (domain, tx hash) for every messages poll.
    pub fn polled(&self) -> Vec<(u32, String)> {
        self.polled.lock().clone()
    }
}

impl AttestationClient for MockAttestationClient {
    fn base_url(&self) -> &str {
        "mock://iris"
    }

    fn fee_quotes(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> BoxFuture<'_, BridgeResult<Value>> {
        Box::pin(async move {
            self.fee_calls.fetch_add(1, Ordering::SeqCst);
            self.fees.lock().clone().ok_or_else(|| BridgeError::Status {
                url: format!("mock://iris/v2/burn/USDC/fees/{source_domain}/{destination_domain}"),
                status: 503,
            })
        })
    }

    fn messages(
        &self,
        source_domain: u32,
        tx_hash: String,
    ) -> BoxFuture<'_, BridgeResult<Option<Value>>> {
        Box::pin(async move {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.polled.lock().push((source_domain, tx_hash));
            let next = self.polls.lock().pop_front();
            match next {
                None | Some(MockPoll::NotFound) => Ok(None),
                Some(MockPoll::TransportError) => Err(BridgeError::Http {
                    url: "mock://iris/v2/messages".to_string(),
                    message: "connection reset".to_string(),
                }),
                Some(MockPoll::Body(body)) => Ok(Some(body)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fee_entry_matching_threshold() {
        let response = json!([
            {"finalityThreshold": 1000, "minimumFee": 1},
            {"finalityThreshold": 2000, "minimumFee": 0}
        ]);
        assert_eq!(select_fee_bps(&response, 2000).unwrap(), Some(0));
        assert_eq!(select_fee_bps(&response, 1000).unwrap(), Some(1));
        // no match falls back to the first entry
        assert_eq!(select_fee_bps(&response, 500).unwrap(), Some(1));
    }

    #[test]
    fn test_fee_response_shapes() {
        assert_eq!(select_fee_bps(&json!([]), 1000).unwrap(), None);
        assert_eq!(select_fee_bps(&json!(["x", 1]), 1000).unwrap(), None);
        assert_eq!(
            select_fee_bps(&json!([{"finalityThreshold": 1000, "minimumFee": "3"}]), 1000).unwrap(),
            Some(3)
        );
        assert_eq!(
            select_fee_bps(&json!([{"finalityThreshold": 1000}]), 1000).unwrap(),
            Some(0)
        );
        let err = select_fee_bps(&json!({"fees": []}), 1000).unwrap_err();
        assert!(matches!(err, BridgeError::UnexpectedResponse { ref field, .. } if field == "iris_response"));
    }

    #[test]
    fn test_compute_fee_rounds_up() {
        assert_eq!(compute_fee(10_000_000, 1), 1_000);
        assert_eq!(compute_fee(10_001, 1), 2);
        assert_eq!(compute_fee(1, 1), 1);
        assert_eq!(compute_fee(5_000_000, 0), 0);
        assert_eq!(compute_fee(u64::MAX, 10_000), u64::MAX);
    }

    #[test]
    fn test_extract_attestation() {
        let ready = json!({"messages": [
            {"status": "pending_confirmations", "message": "0x01", "attestation": "PENDING"},
            {"status": "complete", "message": "0xaa", "attestation": "0xbb"}
        ]});
        assert_eq!(
            extract_attestation(&ready),
            PollStatus::Ready(Attestation {
                message: "0xaa".to_string(),
                attestation: "0xbb".to_string()
            })
        );

        let nested = json!({"data": {"messages": [{"message": "0x01", "attestation": "0x02"}]}});
        assert!(matches!(extract_attestation(&nested), PollStatus::Ready(_)));

        let pending = json!({"messages": [{"status": "pending_confirmations"}]});
        assert_eq!(
            extract_attestation(&pending),
            PollStatus::Pending("pending_confirmations".to_string())
        );

        assert_eq!(extract_attestation(&json!({"messages": []})), PollStatus::Empty);
        assert_eq!(
            extract_attestation(&json!({"messages": [{"status": "complete", "message": "0x01"}]})),
            PollStatus::Empty
        );
        assert_eq!(extract_attestation(&json!({"error": "x"})), PollStatus::Empty);
    }

    #[test]
    fn test_transient_errors() {
        assert!(BridgeError::Http {
            url: String::new(),
            message: String::new()
        }
        .is_transient());
        assert!(BridgeError::Status {
            url: String::new(),
            status: 502
        }
        .is_transient());
        assert!(!BridgeError::Status {
            url: String::new(),
            status: 400
        }
        .is_transient());
    }
}
