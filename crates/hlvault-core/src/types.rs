//! Shared value types passed between the chain, proof, bridge and client
//! layers.

use alloy::primitives::{Bytes, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Verification payload attached to every strategy contract call.
///
/// Mirrors the contract's `VerificationPayload` struct. The default payload
/// (type 0, empty data, empty proof) is what a contract without a verifier
/// expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationPayload {
    pub verification_type: u8,
    pub verification_data: Bytes,
    pub proof: Vec<B256>,
}

impl VerificationPayload {
    pub fn new(verification_type: u8, verification_data: Bytes, proof: Vec<B256>) -> Self {
        Self {
            verification_type,
            verification_data,
            proof,
        }
    }

    pub fn is_default(&self) -> bool {
        self.verification_type == 0 && self.verification_data.is_empty() && self.proof.is_empty()
    }

    /// JSON rendering with `0x` hex bytes, used in logs and error details.
    pub fn to_json(&self) -> Value {
        json!({
            "verificationType": self.verification_type,
            "verificationData": format!("0x{}", hex::encode(&self.verification_data)),
            "proof": self
                .proof
                .iter()
                .map(|p| format!("0x{}", hex::encode(p)))
                .collect::<Vec<_>>(),
        })
    }
}

/// Direction of a CCTP bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDirection {
    MainnetToHyper,
    HyperToMainnet,
}

impl BridgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainnetToHyper => "mainnet_to_hyper",
            Self::HyperToMainnet => "hyper_to_mainnet",
        }
    }
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which chain a call is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    HyperEvm,
    Mainnet,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HyperEvm => "hyperevm",
            Self::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a dispatched contract call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    /// `0x`-prefixed transaction hash.
    pub tx_hash: String,
    /// Logical action label (e.g. `limit_order`).
    pub action: String,
    /// Caller-supplied details (asset, amounts, payloads).
    pub context: Map<String, Value>,
    /// Serialized receipt when the dispatcher waited for one.
    pub receipt: Option<Value>,
    pub block_number: Option<u64>,
    /// Receipt status; `None` when not waited.
    pub status: Option<bool>,
}

impl TxResult {
    /// Raw response shape surfaced through `ActionResponse::raw_response`.
    pub fn to_raw_response(&self) -> Value {
        let mut raw = Map::new();
        raw.insert("action".into(), Value::String(self.action.clone()));
        raw.insert("tx_hash".into(), Value::String(self.tx_hash.clone()));
        raw.insert("context".into(), Value::Object(self.context.clone()));
        if let Some(receipt) = &self.receipt {
            raw.insert("receipt".into(), receipt.clone());
        }
        if let Some(block) = self.block_number {
            raw.insert("block_number".into(), Value::from(block));
        }
        Value::Object(raw)
    }
}

/// Structured result returned by every public client operation.
///
/// Failures never escape as errors; they come back with `success = false`
/// and whatever artifacts (hashes, attestation) were produced before the
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default)]
    pub cancelled_orders: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

impl ActionResponse {
    /// Successful response built from a dispatched transaction.
    pub fn from_tx(tx: &TxResult) -> Self {
        Self {
            success: true,
            transaction_hash: Some(tx.tx_hash.clone()),
            raw_response: Some(tx.to_raw_response()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cloid(mut self, cloid: impl Into<String>) -> Self {
        self.cloid = Some(cloid.into());
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    #[must_use]
    pub fn with_cancelled(mut self, count: u32) -> Self {
        self.cancelled_orders = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_payload() {
        let payload = VerificationPayload::default();
        assert!(payload.is_default());
        assert_eq!(
            payload.to_json(),
            json!({"verificationType": 0, "verificationData": "0x", "proof": []})
        );
    }

    #[test]
    fn test_payload_json_renders_hex() {
        let payload = VerificationPayload::new(
            1,
            Bytes::from(vec![0xab, 0xcd]),
            vec![B256::repeat_byte(0x11)],
        );
        let rendered = payload.to_json();
        assert_eq!(rendered["verificationData"], "0xabcd");
        assert_eq!(rendered["proof"][0], format!("0x{}", "11".repeat(32)));
        assert!(!payload.is_default());
    }

    #[test]
    fn test_action_response_from_tx() {
        let mut context = Map::new();
        context.insert("asset".into(), json!(4));
        let tx = TxResult {
            tx_hash: "0xdead".to_string(),
            action: "placeLimitBuyOrder".to_string(),
            context,
            receipt: None,
            block_number: Some(12),
            status: Some(true),
        };

        let response = ActionResponse::from_tx(&tx)
            .with_cloid("0x01")
            .with_amount(dec!(1.5));
        assert!(response.success);
        assert_eq!(response.transaction_hash.as_deref(), Some("0xdead"));
        let raw = response.raw_response.as_ref().unwrap();
        assert_eq!(raw["action"], "placeLimitBuyOrder");
        assert_eq!(raw["block_number"], 12);
        assert_eq!(raw["context"]["asset"], 4);
    }

    #[test]
    fn test_failure_serializes_without_empty_fields() {
        let response = ActionResponse::failure("boom");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"success": false, "error": "boom", "cancelled_orders": 0}));
    }

    #[test]
    fn test_bridge_direction_labels() {
        assert_eq!(BridgeDirection::MainnetToHyper.to_string(), "mainnet_to_hyper");
        assert_eq!(
            serde_json::to_value(BridgeDirection::HyperToMainnet).unwrap(),
            json!("hyper_to_mainnet")
        );
    }
}
