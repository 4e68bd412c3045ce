//! Proof dataset parsing.
//!
//! A dataset document looks like:
//!
//! ```json
//! {
//!   "title": "HyperEVM strategy",
//!   "merkle_root": "0x…",
//!   "merkle_proofs": [
//!     {"description": "…", "verificationType": 2, "verificationData": "0x…", "proof": ["0x…"]}
//!   ]
//! }
//! ```
//!
//! Every entry is decoded up front so a malformed payload fails at load.

use std::collections::BTreeMap;

use alloy::primitives::{Bytes, B256};
use hlvault_core::VerificationPayload;
use serde_json::{Map, Value};

use crate::error::{ProofError, ProofResult};

pub const INLINE_LABEL: &str = "<inline>";

/// One loaded proof set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofDataset {
    /// Source URL, or `inline:<root>` for inline data.
    pub source_label: String,
    pub title: String,
    pub merkle_root: B256,
    pub payloads: BTreeMap<String, VerificationPayload>,
}

impl ProofDataset {
    /// Parse one dataset object.
    pub fn from_json(value: &Value, source_label: &str) -> ProofResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProofError::invalid("payload", "proof payload is not a JSON object"))?;

        let title = expect_str(object, "title")?.to_string();
        let merkle_root = parse_b256(expect_str(object, "merkle_root")?, "merkle_root")?;

        let entries = object
            .get("merkle_proofs")
            .and_then(Value::as_array)
            .ok_or_else(|| ProofError::invalid("merkle_proofs", "missing merkle_proofs list"))?;

        let mut payloads = BTreeMap::new();
        for entry in entries {
            let entry = entry
                .as_object()
                .ok_or_else(|| ProofError::invalid("merkle_proofs", "proof entry must be an object"))?;
            let description = expect_str(entry, "description")?.to_string();
            let payload = parse_payload(entry)
                .map_err(|e| ProofError::invalid(format!("merkle_proofs[{description}]"), e.to_string()))?;
            payloads.insert(description, payload);
        }

        let source_label = if source_label == INLINE_LABEL {
            format!("inline:0x{}", hex::encode(merkle_root))
        } else {
            source_label.to_string()
        };

        Ok(Self {
            source_label,
            title,
            merkle_root,
            payloads,
        })
    }

    /// Parse a document holding one dataset object or an array of them.
    pub fn parse_many(value: &Value, source_label: &str) -> ProofResult<Vec<Self>> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| Self::from_json(item, source_label))
                .collect(),
            other => Ok(vec![Self::from_json(other, source_label)?]),
        }
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.payloads.keys().cloned().collect()
    }
}

fn expect_str<'a>(object: &'a Map<String, Value>, field: &str) -> ProofResult<&'a str> {
    match object.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ProofError::invalid(field, format!("proof payload missing {field}"))),
    }
}

fn first_of<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Decode a `VerificationPayload` entry, accepting the snake_case aliases.
pub fn parse_payload(entry: &Map<String, Value>) -> ProofResult<VerificationPayload> {
    let verification_type = match first_of(entry, &["verificationType", "verification_type", "type"]) {
        None => 0,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| ProofError::invalid("verificationType", format!("out of range: {n}")))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u8>()
            .map_err(|_| ProofError::invalid("verificationType", format!("not an integer: {s}")))?,
        Some(other) => {
            return Err(ProofError::invalid(
                "verificationType",
                format!("unexpected value {other}"),
            ))
        }
    };

    let verification_data = match first_of(entry, &["verificationData", "verification_data"]) {
        None => Bytes::new(),
        Some(Value::String(s)) => Bytes::from(parse_hex(s, "verificationData")?),
        Some(other) => {
            return Err(ProofError::invalid(
                "verificationData",
                format!("expected hex string, got {other}"),
            ))
        }
    };

    let proof = match first_of(entry, &["proof", "proofs"]) {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| ProofError::invalid("proof", "proof items must be hex strings"))
                    .and_then(|s| parse_b256(s, "proof"))
            })
            .collect::<ProofResult<Vec<_>>>()?,
        Some(other) => {
            return Err(ProofError::invalid(
                "proof",
                format!("expected array, got {other}"),
            ))
        }
    };

    Ok(VerificationPayload::new(verification_type, verification_data, proof))
}

fn parse_hex(raw: &str, field: &str) -> ProofResult<Vec<u8>> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ProofError::invalid(field, "expected hex-encoded string"))?;
    hex::decode(digits).map_err(|e| ProofError::invalid(field, e.to_string()))
}

fn parse_b256(raw: &str, field: &str) -> ProofResult<B256> {
    let bytes = parse_hex(raw, field)?;
    if bytes.len() != 32 {
        return Err(ProofError::invalid(
            field,
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B256::from_slice(&bytes))
}
