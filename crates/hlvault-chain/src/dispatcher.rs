//! Contract call submission and receipt handling.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Bytes, B256};
use alloy::sol_types::SolCall;
use hlvault_core::{ChainKind, CoreError, CoreResult, TxResult};
use hlvault_telemetry::Metrics;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::abi::function_name;
use crate::connections::ChainConnections;
use crate::receipt::{hex_string, serialize_receipt, TransactionReceipt};
use crate::rpc::CallRequest;

pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Receipt handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub wait_for_receipt: bool,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            wait_for_receipt: true,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }
}

/// Submits strategy contract calls and optionally waits for receipts.
pub struct TransactionDispatcher {
    connections: Arc<ChainConnections>,
    config: DispatchConfig,
}

impl TransactionDispatcher {
    pub fn new(connections: Arc<ChainConnections>, config: DispatchConfig) -> Self {
        Self {
            connections,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ChainConnections> {
        &self.connections
    }

    /// Submit `call` to the strategy contract on `chain` and, when
    /// configured, wait for its receipt.
    ///
    /// `action` names the logical operation (e.g. `limit_order`); `context`
    /// is echoed back in the result and attached to submission errors.
    /// Submission is never retried.
    pub async fn send<C: SolCall>(
        &self,
        chain: ChainKind,
        call: &C,
        action: &str,
        context: Map<String, Value>,
    ) -> CoreResult<TxResult> {
        let tx = self.submit(chain, call, action, context).await?;
        if self.config.wait_for_receipt {
            self.confirm(chain, tx, function_name::<C>()).await
        } else {
            Ok(tx)
        }
    }

    /// Submit without waiting. The result carries the hash only.
    pub async fn submit<C: SolCall>(
        &self,
        chain: ChainKind,
        call: &C,
        action: &str,
        context: Map<String, Value>,
    ) -> CoreResult<TxResult> {
        self.connections.ensure_connected()?;

        let function = function_name::<C>();
        let rpc = self.connections.rpc(chain);
        let request = CallRequest {
            from: self.connections.sender(),
            to: self.connections.contract(chain),
            data: Bytes::from(call.abi_encode()),
        };

        info!(action, function, chain = %chain, "Dispatching contract call");

        let tx_hash = match rpc.send_transaction(request.clone()).await {
            Ok(hash) => hash,
            Err(err) => {
                Metrics::tx_failed(function);
                warn!(action, function, error = %err, "Transaction submission failed");
                let details = json!({
                    "args": Value::Object(context),
                    "calldata": hex_string(&request.data),
                    "error": err.to_string(),
                });
                return Err(CoreError::network(
                    format!("Failed to submit transaction for {action}"),
                    function,
                )
                .with_details(details.to_string()));
            }
        };
        Metrics::tx_submitted(function);

        let tx_hex = hex_string(tx_hash.as_slice());
        info!(action, tx_hash = %tx_hex, "Transaction sent");

        Ok(TxResult {
            tx_hash: tx_hex,
            action: action.to_string(),
            context,
            receipt: None,
            block_number: None,
            status: None,
        })
    }

    /// Wait for the receipt of a submitted transaction and attach it.
    ///
    /// A reverted receipt is a network error.
    pub async fn confirm(
        &self,
        chain: ChainKind,
        mut tx: TxResult,
        function: &str,
    ) -> CoreResult<TxResult> {
        let tx_hash: B256 = tx.tx_hash.parse().map_err(|_| {
            CoreError::validation("Malformed transaction hash", "tx_hash", &tx.tx_hash)
        })?;

        let receipt = self.wait_for_receipt(chain, tx_hash, function).await?;
        info!(
            action = %tx.action,
            tx_hash = %tx.tx_hash,
            block = ?receipt.block_number,
            status = receipt.status,
            "Transaction confirmed"
        );
        if !receipt.status {
            Metrics::tx_failed(function);
            return Err(CoreError::network(
                format!("Transaction {} reverted", tx.tx_hash),
                function,
            )
            .with_details(json!({ "receipt": receipt.to_json() }).to_string()));
        }

        tx.receipt = serialize_receipt(Some(&receipt));
        tx.block_number = receipt.block_number;
        tx.status = Some(receipt.status);
        Ok(tx)
    }

    /// Poll for a receipt until the configured timeout.
    pub async fn wait_for_receipt(
        &self,
        chain: ChainKind,
        tx_hash: B256,
        function: &str,
    ) -> CoreResult<TransactionReceipt> {
        let rpc = self.connections.rpc(chain);
        let started = Instant::now();

        loop {
            match rpc.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    Metrics::tx_confirmed(function, started.elapsed().as_secs_f64());
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(tx_hash = %tx_hash, error = %err, "Receipt poll failed");
                }
            }

            if started.elapsed() >= self.config.receipt_timeout {
                Metrics::tx_failed(function);
                return Err(CoreError::network(
                    format!(
                        "Timed out after {}s waiting for receipt of {}",
                        self.config.receipt_timeout.as_secs(),
                        hex_string(tx_hash.as_slice())
                    ),
                    rpc.endpoint(),
                )
                .with_details(hex_string(tx_hash.as_slice())));
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{IHyperliquidStrategy, VerificationPayload};
    use crate::connections::ContractAddresses;
    use crate::mock::MockEvmRpc;
    use alloy::primitives::Address;

    fn setup(config: DispatchConfig) -> (Arc<MockEvmRpc>, TransactionDispatcher) {
        let hyper = Arc::new(MockEvmRpc::new("mock://hyper"));
        let mainnet = Arc::new(MockEvmRpc::new("mock://mainnet"));
        let conns = Arc::new(ChainConnections::new(
            hyper.clone(),
            mainnet,
            ContractAddresses {
                strategy: Address::repeat_byte(0x51),
                bridge_strategy: Address::repeat_byte(0x52),
                sender: Address::repeat_byte(0x53),
            },
        ));
        (hyper, TransactionDispatcher::new(conns, config))
    }

    fn transfer_call() -> IHyperliquidStrategy::transferSpotToPerpCall {
        IHyperliquidStrategy::transferSpotToPerpCall {
            amount: 1_500_000,
            payload: VerificationPayload {
                verificationType: 0,
                verificationData: Bytes::new(),
                proof: Vec::new(),
            },
        }
    }

    fn context() -> Map<String, Value> {
        let mut ctx = Map::new();
        ctx.insert("amount".into(), json!("1.5"));
        ctx
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (hyper, dispatcher) = setup(DispatchConfig::default());
        let err = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(hyper.send_count(), 0);
    }

    #[tokio::test]
    async fn test_send_waits_for_receipt() {
        let (hyper, dispatcher) = setup(DispatchConfig::default());
        dispatcher.connections().connect().await.unwrap();

        let result = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap();

        assert!(result.tx_hash.starts_with("0x"));
        assert_eq!(result.tx_hash.len(), 66);
        assert_eq!(result.action, "usd_class_transfer");
        assert_eq!(result.status, Some(true));
        assert!(result.block_number.is_some());
        assert_eq!(result.receipt.as_ref().unwrap()["status"], 1);

        let sends = hyper.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].to, Address::repeat_byte(0x51));
        assert_eq!(sends[0].from, Address::repeat_byte(0x53));
        assert_eq!(
            &sends[0].data[..4],
            IHyperliquidStrategy::transferSpotToPerpCall::SELECTOR
        );
    }

    #[tokio::test]
    async fn test_send_without_receipt_wait() {
        let config = DispatchConfig {
            wait_for_receipt: false,
            ..DispatchConfig::default()
        };
        let (hyper, dispatcher) = setup(config);
        dispatcher.connections().connect().await.unwrap();

        let result = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap();
        assert!(result.receipt.is_none());
        assert!(result.block_number.is_none());
        assert_eq!(hyper.receipt_polls(), 0);
    }

    #[tokio::test]
    async fn test_submission_failure_carries_function_and_args() {
        let (hyper, dispatcher) = setup(DispatchConfig::default());
        dispatcher.connections().connect().await.unwrap();
        hyper.fail_next_send("insufficient funds");

        let err = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap_err();
        match err {
            CoreError::Network {
                endpoint, details, ..
            } => {
                assert_eq!(endpoint, "transferSpotToPerp");
                let details = details.unwrap();
                assert!(details.contains("insufficient funds"));
                assert!(details.contains("\"amount\":\"1.5\""));
            }
            other => panic!("unexpected {other:?}"),
        }
        // never retried
        assert_eq!(hyper.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_timeout_carries_hash() {
        let config = DispatchConfig {
            wait_for_receipt: true,
            receipt_timeout: Duration::from_millis(50),
            receipt_poll_interval: Duration::from_millis(10),
        };
        let (hyper, dispatcher) = setup(config);
        dispatcher.connections().connect().await.unwrap();
        hyper.set_receipts_available(false);

        let err = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains("Timed out"));
        assert!(hyper.receipt_polls() >= 1);
    }

    #[tokio::test]
    async fn test_submit_then_confirm() {
        let (hyper, dispatcher) = setup(DispatchConfig::default());
        dispatcher.connections().connect().await.unwrap();

        let pending = dispatcher
            .submit(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap();
        assert!(pending.receipt.is_none());
        assert_eq!(hyper.receipt_polls(), 0);

        let hash = pending.tx_hash.clone();
        let confirmed = dispatcher
            .confirm(ChainKind::HyperEvm, pending, "transferSpotToPerp")
            .await
            .unwrap();
        assert_eq!(confirmed.tx_hash, hash);
        assert_eq!(confirmed.status, Some(true));
        assert_eq!(confirmed.context["amount"], json!("1.5"));
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_error() {
        let (hyper, dispatcher) = setup(DispatchConfig::default());
        dispatcher.connections().connect().await.unwrap();
        hyper.set_receipt_status(false);

        let err = dispatcher
            .send(ChainKind::HyperEvm, &transfer_call(), "usd_class_transfer", context())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }
}
