//! CCTP v2 bridge orchestration.
//!
//! Stages: normalize amount, quote fee, burn on the source chain, wait for
//! the Iris attestation, claim on the destination chain. Burn and claim are
//! independent transactions; a failure after the burn returns every
//! artifact produced so far (burn hash, message, attestation) so the
//! transfer can be finished by hand.

use std::sync::Arc;

use alloy::primitives::{Bytes, U256};
use hlvault_chain::abi::{self, ICctpBridgeStrategy};
use hlvault_chain::TransactionDispatcher;
use hlvault_core::{ActionResponse, BridgeDirection, ChainKind, CoreError, CoreResult};
use hlvault_proofs::DynResolver;
use hlvault_telemetry::Metrics;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::amount::normalize_usdc_amount;
use crate::config::BridgeConfig;
use crate::iris::{compute_fee, extract_attestation, select_fee_bps, Attestation, DynAttestationClient, PollStatus};

/// Proof descriptions for the two checks `bridgeUSDCViaCCTPv2` performs.
pub const CCTP_PAYLOAD_DESCRIPTIONS: [&str; 2] = [
    "USDC.approve(TokenMessenger, anyInt)",
    "TokenMessenger.depositForBurn(anyInt)",
];

/// One bridge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    /// Whole USDC; truncated to 6 decimals.
    pub amount: Decimal,
    /// Fee override in USDC units; skips the Iris quote.
    pub max_fee: Option<i64>,
    /// Overrides the configured finality threshold for the burn and for
    /// picking the Iris fee entry; the quote follows the threshold actually
    /// burned with.
    pub min_finality_threshold: Option<i64>,
}

impl BridgeRequest {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            max_fee: None,
            min_finality_threshold: None,
        }
    }
}

/// Source and destination of one direction.
#[derive(Debug, Clone, Copy)]
struct Route {
    source_chain: ChainKind,
    destination_chain: ChainKind,
    source_domain: u32,
    destination_domain: u32,
}

/// Partial results of one bridge call.
struct Attempt {
    direction: BridgeDirection,
    raw: Map<String, Value>,
    amount: Option<Decimal>,
    burn_tx_hash: Option<String>,
    attestation: Option<Attestation>,
}

impl Attempt {
    fn new(direction: BridgeDirection, route: &Route) -> Self {
        let mut raw = Map::new();
        raw.insert("direction".into(), json!(direction.as_str()));
        raw.insert("source_domain".into(), json!(route.source_domain));
        raw.insert("destination_domain".into(), json!(route.destination_domain));
        Self {
            direction,
            raw,
            amount: None,
            burn_tx_hash: None,
            attestation: None,
        }
    }

    fn stage_ok(&self, stage: &str) {
        Metrics::bridge_stage(self.direction.as_str(), stage, true);
    }

    fn response(self, success: bool, error: Option<String>) -> ActionResponse {
        let (message, attestation) = match self.attestation {
            Some(a) => (Some(a.message), Some(a.attestation)),
            None => (None, None),
        };
        ActionResponse {
            success,
            error,
            raw_response: Some(Value::Object(self.raw)),
            amount: self.amount,
            burn_tx_hash: self.burn_tx_hash,
            message,
            attestation,
            ..ActionResponse::default()
        }
    }

    fn fail(mut self, stage: &str, err: CoreError) -> ActionResponse {
        Metrics::bridge_stage(self.direction.as_str(), stage, false);
        debug!(direction = %self.direction, stage, reason = %err, "CCTP bridge aborted");

        if let Some(field) = err.field() {
            self.raw.insert("field".into(), json!(field));
        }
        if let Some(value) = err.value() {
            self.raw.insert("value".into(), json!(value));
        }
        if let CoreError::Network {
            details: Some(details),
            ..
        } = &err
        {
            self.raw.insert("details".into(), json!(details));
        }
        self.response(false, Some(err.to_string()))
    }
}

/// Drives CCTP v2 transfers between Ethereum and HyperEVM.
pub struct CctpBridge {
    dispatcher: Arc<TransactionDispatcher>,
    iris: DynAttestationClient,
    resolver: DynResolver,
    config: BridgeConfig,
}

impl CctpBridge {
    pub fn new(
        dispatcher: Arc<TransactionDispatcher>,
        iris: DynAttestationClient,
        resolver: DynResolver,
        config: BridgeConfig,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            dispatcher,
            iris,
            resolver,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub async fn bridge_mainnet_to_hyperliquid(&self, request: &BridgeRequest) -> ActionResponse {
        self.bridge(BridgeDirection::MainnetToHyper, request).await
    }

    pub async fn bridge_hyperliquid_to_mainnet(&self, request: &BridgeRequest) -> ActionResponse {
        self.bridge(BridgeDirection::HyperToMainnet, request).await
    }

    fn route(&self, direction: BridgeDirection) -> Route {
        match direction {
            BridgeDirection::MainnetToHyper => Route {
                source_chain: ChainKind::Mainnet,
                destination_chain: ChainKind::HyperEvm,
                source_domain: self.config.mainnet_domain,
                destination_domain: self.config.hyper_domain,
            },
            BridgeDirection::HyperToMainnet => Route {
                source_chain: ChainKind::HyperEvm,
                destination_chain: ChainKind::Mainnet,
                source_domain: self.config.hyper_domain,
                destination_domain: self.config.mainnet_domain,
            },
        }
    }

    /// Run every stage for `direction`. Never returns an error; failures
    /// come back as `success = false` with the artifacts produced so far.
    pub async fn bridge(&self, direction: BridgeDirection, request: &BridgeRequest) -> ActionResponse {
        let route = self.route(direction);
        let mut attempt = Attempt::new(direction, &route);

        if let Err(err) = self.dispatcher.connections().ensure_connected() {
            return attempt.fail("connect", err);
        }

        // NormalizeAmount
        let normalized = match normalize_usdc_amount(request.amount) {
            Ok(normalized) => normalized,
            Err(err) => return attempt.fail("normalize", err),
        };
        if normalized.truncated {
            warn!(
                requested = %request.amount,
                amount = %normalized.amount,
                direction = %direction,
                "Truncating bridge amount to 6 decimals"
            );
        }
        let units = normalized.units;
        attempt.amount = Some(normalized.amount);
        attempt.raw.insert("amount_units".into(), json!(units));
        debug!(direction = %direction, amount = %normalized.amount, units, "CCTP stage: prepare amount");
        attempt.stage_ok("normalize");

        // QuoteFee
        if let Some(fee) = request.max_fee.filter(|fee| *fee < 0) {
            attempt.raw.insert("max_fee".into(), json!(fee));
            return attempt.fail(
                "quote_fee",
                CoreError::validation("max_fee must be non-negative", "max_fee", fee),
            );
        }

        let threshold = request
            .min_finality_threshold
            .unwrap_or(self.config.finality_threshold);
        attempt.raw.insert("finality_threshold".into(), json!(threshold));
        if threshold <= 0 {
            return attempt.fail(
                "quote_fee",
                CoreError::validation(
                    "Finality threshold must be positive",
                    "finality_threshold",
                    threshold,
                ),
            );
        }
        let Ok(threshold) = u32::try_from(threshold) else {
            return attempt.fail(
                "quote_fee",
                CoreError::range_exceeded(
                    "Finality threshold exceeds uint32",
                    "finality_threshold",
                    threshold,
                ),
            );
        };

        let max_fee = match request.max_fee {
            // non-negative, checked above
            Some(fee) => fee.unsigned_abs(),
            None => match self.quote_fee(units, threshold, &route).await {
                Ok(fee) => fee,
                Err(err) => return attempt.fail("quote_fee", err),
            },
        };
        attempt.raw.insert("max_fee".into(), json!(max_fee));
        if max_fee >= units {
            return attempt.fail(
                "quote_fee",
                CoreError::validation(
                    "Quoted max fee exceeds or equals bridge amount",
                    "max_fee",
                    max_fee,
                ),
            );
        }
        attempt.stage_ok("quote_fee");

        // Burn
        let payloads = match self.resolve_payloads(route.source_chain) {
            Ok(payloads) => payloads,
            Err(err) => return attempt.fail("burn", err),
        };
        let call = ICctpBridgeStrategy::bridgeUSDCViaCCTPv2Call {
            amount: U256::from(units),
            maxFee: U256::from(max_fee),
            minFinalityThreshold: threshold,
            payloads: payloads.iter().map(abi::VerificationPayload::from).collect(),
        };
        let mut context = Map::new();
        context.insert("direction".into(), json!(direction.as_str()));
        context.insert("amount_units".into(), json!(units));
        context.insert("max_fee".into(), json!(max_fee));
        context.insert("finality_threshold".into(), json!(threshold));
        context.insert(
            "payloads".into(),
            Value::Array(payloads.iter().map(|p| p.to_json()).collect()),
        );

        debug!(direction = %direction, "CCTP stage: submit burn transaction");
        let burn = match self
            .dispatcher
            .submit(route.source_chain, &call, "cctp_burn", context)
            .await
        {
            Ok(tx) => tx,
            Err(err) => {
                error!(direction = %direction, error = %err, "Failed to submit CCTP burn");
                return attempt.fail("burn", err);
            }
        };
        attempt.burn_tx_hash = Some(burn.tx_hash.clone());
        debug!(direction = %direction, tx = %burn.tx_hash, "CCTP stage: burn submitted");

        if self.dispatcher.config().wait_for_receipt {
            match self
                .dispatcher
                .confirm(route.source_chain, burn.clone(), "bridgeUSDCViaCCTPv2")
                .await
            {
                Ok(confirmed) => {
                    if let Some(receipt) = confirmed.receipt {
                        attempt.raw.insert("burn_receipt".into(), receipt);
                    }
                }
                Err(err) => return attempt.fail("burn", err),
            }
        }
        attempt.stage_ok("burn");

        // AwaitAttestation
        let attestation = match self
            .poll_attestation(direction, route.source_domain, &burn.tx_hash)
            .await
        {
            Ok(attestation) => attestation,
            Err(err) => {
                error!(direction = %direction, error = %err, "IRIS attestation failed");
                return attempt.fail("attestation", err);
            }
        };
        attempt.attestation = Some(attestation.clone());
        attempt.stage_ok("attestation");

        // Claim
        let claim_call = match (
            decode_hex_field(&attestation.message, "message"),
            decode_hex_field(&attestation.attestation, "attestation"),
        ) {
            (Ok(message), Ok(attestation)) => ICctpBridgeStrategy::receiveUSDCViaCCTPv2Call {
                message,
                attestation,
            },
            (Err(err), _) | (_, Err(err)) => return attempt.fail("claim", err),
        };
        let mut context = Map::new();
        context.insert("direction".into(), json!(direction.as_str()));
        context.insert("burn_tx_hash".into(), json!(burn.tx_hash));

        debug!(direction = %direction, "CCTP stage: submit claim transaction");
        let claim = match self
            .dispatcher
            .send(route.destination_chain, &claim_call, "cctp_claim", context)
            .await
        {
            Ok(tx) => tx,
            Err(err) => {
                error!(direction = %direction, error = %err, "Failed to submit CCTP claim");
                return attempt.fail("claim", err);
            }
        };
        if let Some(receipt) = claim.receipt {
            attempt.raw.insert("claim_receipt".into(), receipt);
        }
        attempt.stage_ok("claim");

        info!(
            direction = %direction,
            burn_tx = %burn.tx_hash,
            claim_tx = %claim.tx_hash,
            units,
            "CCTP bridge complete"
        );
        let mut response = attempt.response(true, None);
        response.transaction_hash = Some(claim.tx_hash.clone());
        response.claim_tx_hash = Some(claim.tx_hash);
        response
    }

    /// Fee in USDC units from the Iris quote for `threshold`.
    async fn quote_fee(&self, units: u64, threshold: u32, route: &Route) -> CoreResult<u64> {
        debug!(
            source = route.source_domain,
            destination = route.destination_domain,
            "CCTP stage: fetch fee quote"
        );
        let response = self
            .iris
            .fee_quotes(route.source_domain, route.destination_domain)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch CCTP fee quote");
                CoreError::network(
                    format!("Failed to fetch CCTP fee quote: {e}"),
                    self.iris.base_url(),
                )
            })?;

        let Some(bps) = select_fee_bps(&response, threshold)? else {
            warn!(
                source = route.source_domain,
                destination = route.destination_domain,
                "Fee response missing usable entries"
            );
            return Ok(0);
        };

        let fee = compute_fee(units, bps);
        info!(
            source = route.source_domain,
            destination = route.destination_domain,
            bps,
            max_fee = fee,
            "CCTP fee quote"
        );
        Ok(fee)
    }

    /// Payloads for the burn, from the dataset matching the source chain.
    fn resolve_payloads(
        &self,
        source_chain: ChainKind,
    ) -> CoreResult<Vec<hlvault_core::VerificationPayload>> {
        let dataset = self.resolver.dataset_for_chain(source_chain);
        CCTP_PAYLOAD_DESCRIPTIONS
            .iter()
            .map(|description| self.resolver.resolve(description, &dataset))
            .collect()
    }

    /// Poll Iris until the burn's attestation is complete.
    async fn poll_attestation(
        &self,
        direction: BridgeDirection,
        domain: u32,
        tx_hash: &str,
    ) -> CoreResult<Attestation> {
        let max_polls = self.config.max_polls;
        debug!(
            direction = %direction,
            domain,
            tx = %tx_hash,
            max_polls,
            interval = ?self.config.poll_interval,
            "CCTP stage: poll IRIS"
        );

        for attempt in 1..=max_polls {
            match self.iris.messages(domain, tx_hash.to_string()).await {
                Ok(None) => {
                    Metrics::iris_poll("not_found");
                    debug!(tx = %tx_hash, attempt, max_polls, "IRIS attestation not yet available (404)");
                }
                Ok(Some(body)) => match extract_attestation(&body) {
                    PollStatus::Ready(attestation) => {
                        Metrics::iris_poll("complete");
                        info!(tx = %tx_hash, attempt, "IRIS attestation received");
                        return Ok(attestation);
                    }
                    PollStatus::Pending(status) => {
                        Metrics::iris_poll("pending");
                        debug!(tx = %tx_hash, status = %status, attempt, max_polls, "IRIS attestation pending");
                    }
                    PollStatus::Empty => {
                        Metrics::iris_poll("empty");
                        debug!(tx = %tx_hash, attempt, max_polls, "IRIS returned no usable messages");
                    }
                },
                Err(err) if err.is_transient() => {
                    Metrics::iris_poll("error");
                    debug!(attempt, max_polls, error = %err, "IRIS poll error");
                }
                Err(err) => {
                    Metrics::iris_poll("error");
                    return Err(err.into());
                }
            }

            if attempt < max_polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(CoreError::timeout(
            format!(
                "Timed out waiting for IRIS attestation after {:.0} seconds",
                self.config.max_wait().as_secs_f64()
            ),
            Some(tx_hash.to_string()),
        ))
    }
}

fn decode_hex_field(raw: &str, field: &str) -> CoreResult<Bytes> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| CoreError::validation(format!("Invalid hex in IRIS {field}: {e}"), field, raw))
}
