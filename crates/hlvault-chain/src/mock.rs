//! In-memory `EvmRpc` for tests across the workspace.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy::primitives::{Address, Bytes, B256};
use parking_lot::Mutex;

use crate::error::{ChainError, ChainResult};
use crate::receipt::TransactionReceipt;
use crate::rpc::{BoxFuture, CallRequest, EvmRpc};

#[derive(Debug, Clone)]
enum CannedCall {
    Ok(Bytes),
    Revert(String),
}

#[derive(Debug, Clone)]
struct CallRule {
    to: Address,
    prefix: Vec<u8>,
    response: CannedCall,
}

/// Mock node with canned `eth_call` answers and recorded submissions.
///
/// Call rules match on target address and calldata prefix (usually the
/// selector); the most recently registered matching rule wins. Unmatched
/// calls revert.
#[derive(Debug)]
pub struct MockEvmRpc {
    endpoint: String,
    chain_id: AtomicU64,
    chain_id_fails: AtomicBool,
    rules: Mutex<Vec<CallRule>>,
    calls: Mutex<Vec<(Address, Bytes)>>,
    sends: Mutex<Vec<CallRequest>>,
    send_failures: Mutex<VecDeque<String>>,
    next_hash: AtomicU64,
    receipts_available: AtomicBool,
    receipt_status: AtomicBool,
    receipt_polls: AtomicU64,
}

impl MockEvmRpc {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            chain_id: AtomicU64::new(999),
            chain_id_fails: AtomicBool::new(false),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            send_failures: Mutex::new(VecDeque::new()),
            next_hash: AtomicU64::new(1),
            receipts_available: AtomicBool::new(true),
            receipt_status: AtomicBool::new(true),
            receipt_polls: AtomicU64::new(0),
        }
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }

    /// Make `chain_id` fail, simulating an unreachable node.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.chain_id_fails.store(unreachable, Ordering::SeqCst);
    }

    /// Answer `eth_call` to `to` whose calldata starts with `prefix`.
    pub fn on_call(&self, to: Address, prefix: impl Into<Vec<u8>>, response: impl Into<Bytes>) {
        self.rules.lock().push(CallRule {
            to,
            prefix: prefix.into(),
            response: CannedCall::Ok(response.into()),
        });
    }

    /// Revert `eth_call` to `to` whose calldata starts with `prefix`.
    pub fn revert_call(&self, to: Address, prefix: impl Into<Vec<u8>>, reason: impl Into<String>) {
        self.rules.lock().push(CallRule {
            to,
            prefix: prefix.into(),
            response: CannedCall::Revert(reason.into()),
        });
    }

    /// Fail the next `eth_sendTransaction` with the given message.
    pub fn fail_next_send(&self, message: impl Into<String>) {
        self.send_failures.lock().push_back(message.into());
    }

    /// When false, receipts stay pending forever.
    pub fn set_receipts_available(&self, available: bool) {
        self.receipts_available.store(available, Ordering::SeqCst);
    }

    /// Status reported in receipts (false = reverted).
    pub fn set_receipt_status(&self, ok: bool) {
        self.receipt_status.store(ok, Ordering::SeqCst);
    }

    /// Recorded `eth_call`s.
    pub fn calls(&self) -> Vec<(Address, Bytes)> {
        self.calls.lock().clone()
    }

    /// Number of `eth_call`s to `to`.
    pub fn call_count_to(&self, to: Address) -> usize {
        self.calls.lock().iter().filter(|(addr, _)| *addr == to).count()
    }

    /// Recorded submissions, failed ones included.
    pub fn sends(&self) -> Vec<CallRequest> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    pub fn receipt_polls(&self) -> u64 {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    fn hash_for(n: u64) -> B256 {
        B256::left_padding_from(&n.to_be_bytes())
    }
}

impl EvmRpc for MockEvmRpc {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn chain_id(&self) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            if self.chain_id_fails.load(Ordering::SeqCst) {
                return Err(ChainError::Status {
                    method: "eth_chainId".to_string(),
                    status: 503,
                });
            }
            Ok(self.chain_id.load(Ordering::SeqCst))
        })
    }

    fn call(&self, to: Address, data: Bytes) -> BoxFuture<'_, ChainResult<Bytes>> {
        Box::pin(async move {
            self.calls.lock().push((to, data.clone()));
            let rule = self
                .rules
                .lock()
                .iter()
                .rev()
                .find(|rule| rule.to == to && data.starts_with(&rule.prefix))
                .map(|rule| rule.response.clone());

            match rule {
                Some(CannedCall::Ok(bytes)) => Ok(bytes),
                Some(CannedCall::Revert(reason)) => Err(ChainError::Rpc {
                    method: "eth_call".to_string(),
                    code: 3,
                    message: format!("execution reverted: {reason}"),
                }),
                None => Err(ChainError::Rpc {
                    method: "eth_call".to_string(),
                    code: 3,
                    message: "execution reverted".to_string(),
                }),
            }
        })
    }

    fn send_transaction(&self, request: CallRequest) -> BoxFuture<'_, ChainResult<B256>> {
        Box::pin(async move {
            self.sends.lock().push(request);
            if let Some(message) = self.send_failures.lock().pop_front() {
                return Err(ChainError::Rpc {
                    method: "eth_sendTransaction".to_string(),
                    code: -32000,
                    message,
                });
            }
            let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
            Ok(Self::hash_for(n))
        })
    }

    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> BoxFuture<'_, ChainResult<Option<TransactionReceipt>>> {
        Box::pin(async move {
            let polls = self.receipt_polls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.receipts_available.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(TransactionReceipt {
                transaction_hash: tx_hash,
                block_number: Some(100 + polls),
                status: self.receipt_status.load(Ordering::SeqCst),
                gas_used: Some(21_000),
                logs: Vec::new(),
                extra: Default::default(),
            }))
        })
    }
}
