//! Transaction receipts as returned by `eth_getTransactionReceipt`.

use crate::error::{ChainError, ChainResult};
use alloy::primitives::{Address, Bytes, B256};
use serde_json::{json, Map, Value};

const METHOD: &str = "eth_getTransactionReceipt";

const RECEIPT_FIELDS: &[&str] = &["transactionHash", "blockNumber", "status", "gasUsed", "logs"];
const LOG_FIELDS: &[&str] = &["address", "topics", "data"];

/// One emitted log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    /// Remaining node fields (`logIndex`, `blockHash`, ...), hex lowercased.
    pub extra: Map<String, Value>,
}

/// Node receipt: the fields the client inspects are typed, the rest is kept
/// as returned so callers see the whole object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    /// `true` when the transaction executed without reverting.
    pub status: bool,
    pub gas_used: Option<u64>,
    pub logs: Vec<ReceiptLog>,
    /// Remaining node fields (`from`, `effectiveGasPrice`, ...), hex lowercased.
    pub extra: Map<String, Value>,
}

impl TransactionReceipt {
    /// Parse the node's JSON receipt object.
    pub fn from_json(value: &Value) -> ChainResult<Self> {
        let transaction_hash = parse_b256(required_str(value, "transactionHash")?)?;
        let block_number = optional_u64(value, "blockNumber")?;
        let gas_used = optional_u64(value, "gasUsed")?;
        // Pre-Byzantium receipts carry no status; treat them as success.
        let status = optional_u64(value, "status")?.map_or(true, |s| s == 1);

        let logs = match value.get("logs") {
            Some(Value::Array(entries)) => entries
                .iter()
                .map(ReceiptLog::from_json)
                .collect::<ChainResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            transaction_hash,
            block_number,
            status,
            gas_used,
            logs,
            extra: unmodelled_fields(value, RECEIPT_FIELDS),
        })
    }

    /// The full receipt with every byte field as lowercase `0x` hex.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "transactionHash".into(),
            json!(hex_string(self.transaction_hash.as_slice())),
        );
        out.insert("blockNumber".into(), json!(self.block_number));
        out.insert("status".into(), json!(u8::from(self.status)));
        out.insert("gasUsed".into(), json!(self.gas_used));
        out.insert(
            "logs".into(),
            Value::Array(self.logs.iter().map(ReceiptLog::to_json).collect()),
        );
        out.extend(self.extra.clone());
        Value::Object(out)
    }
}

impl ReceiptLog {
    fn from_json(value: &Value) -> ChainResult<Self> {
        let address = required_str(value, "address")?
            .parse::<Address>()
            .map_err(|e| ChainError::decode("log address", e))?;
        let topics = match value.get("topics") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| ChainError::invalid_response(METHOD, "topic is not a string"))
                        .and_then(parse_b256)
                })
                .collect::<ChainResult<Vec<_>>>()?,
            _ => Vec::new(),
        };
        let data = match value.get("data").and_then(Value::as_str) {
            Some(raw) => Bytes::from(parse_hex_bytes(raw)?),
            None => Bytes::new(),
        };
        Ok(Self {
            address,
            topics,
            data,
            extra: unmodelled_fields(value, LOG_FIELDS),
        })
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("address".into(), json!(format!("{:?}", self.address)));
        out.insert(
            "topics".into(),
            self.topics
                .iter()
                .map(|t| json!(hex_string(t.as_slice())))
                .collect(),
        );
        out.insert("data".into(), json!(hex_string(&self.data)));
        out.extend(self.extra.clone());
        Value::Object(out)
    }
}

/// Serialize an optional receipt for `TxResult`.
pub fn serialize_receipt(receipt: Option<&TransactionReceipt>) -> Option<Value> {
    receipt.map(TransactionReceipt::to_json)
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub(crate) fn parse_hex_u64(s: &str) -> ChainResult<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::decode(format!("hex u64 {s}"), e))
}

pub(crate) fn parse_hex_bytes(s: &str) -> ChainResult<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(digits).map_err(|e| ChainError::decode("hex bytes", e))
}

pub(crate) fn parse_b256(s: &str) -> ChainResult<B256> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return Err(ChainError::decode(
            "bytes32",
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B256::from_slice(&bytes))
}

fn unmodelled_fields(value: &Value, modelled: &[&str]) -> Map<String, Value> {
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(key, _)| !modelled.contains(&key.as_str()))
                .map(|(key, field)| (key.clone(), normalize_hex(field.clone())))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_hex(value: Value) -> Value {
    match value {
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => {
            Value::String(format!("0x{}", s[2..].to_ascii_lowercase()))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_hex).collect()),
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, field)| (key, normalize_hex(field)))
                .collect(),
        ),
        other => other,
    }
}

fn required_str<'a>(value: &'a Value, key: &str) -> ChainResult<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::invalid_response(METHOD, format!("missing `{key}`")))
}

fn optional_u64(value: &Value, key: &str) -> ChainResult<Option<u64>> {
    match value.get(key) {
        Some(Value::String(s)) => parse_hex_u64(s).map(Some),
        Some(Value::Number(n)) => Ok(n.as_u64()),
        _ => Ok(None),
    }
}
