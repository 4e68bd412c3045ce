//! Strategy client.
//!
//! Every trading action goes through the HyperEVM strategy contract, which
//! forwards it to CoreWriter. Actions resolve identifiers and decimals
//! through `MetadataCache`, attach a verification payload, and dispatch the
//! call. Public actions never return errors: failures come back as an
//! `ActionResponse` with `success = false`.

use std::sync::Arc;

use alloy::primitives::Address;
use hlvault_bridge::{BridgeConfig, BridgeRequest, CctpBridge, DynAttestationClient, IrisClient};
use hlvault_chain::abi::{IHyperliquidStrategy, VerificationPayload};
use hlvault_chain::{ChainConnections, DynEvmRpc, JsonRpcChain, TransactionDispatcher};
use hlvault_core::{
    to_fixed_point, ActionResponse, ChainKind, Cloid, CoreError, CoreResult, OrderSide,
    TimeInForce, USD_DECIMALS, WIRE_DECIMALS,
};
use hlvault_proofs::{build_resolver, DynResolver};
use hlvault_registry::{DynInfoSource, InfoClient, MarketPrices, MetadataCache};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientResult;

const LIMIT_ORDER_PROOF: &str = "CoreWriter.sendRawAction{action: limit_order}(anyBytes)";
const CANCEL_OID_PROOF: &str = "CoreWriter.sendRawAction{action: cancel_oid}(anyBytes)";
const CANCEL_CLOID_PROOF: &str = "CoreWriter.sendRawAction{action: cancel_cloid}(anyBytes)";
const SPOT_SEND_PROOF: &str = "CoreWriter.sendRawAction{action: spot_send}(anyBytes)";
const USD_TRANSFER_PROOF: &str = "CoreWriter.sendRawAction{action: usd_transfer}(anyBytes)";

/// Default market order slippage (5%).
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.05);

/// Contract functions the client dispatches, for session summaries.
pub const DISPATCHED_FUNCTIONS: [&str; 10] = [
    "placeLimitBuyOrder",
    "placeLimitSellOrder",
    "cancelOrderByOid",
    "cancelOrderByCloid",
    "transferSpotToPerp",
    "transferPerpToSpot",
    "withdrawHypeToEvm",
    "withdrawTokenToEvm",
    "bridgeUSDCViaCCTPv2",
    "receiveUSDCViaCCTPv2",
];

/// Limit order parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    /// Symbol or numeric asset id.
    pub asset: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub reduce_only: bool,
    pub tif: TimeInForce,
    pub cloid: Option<Cloid>,
}

impl LimitOrder {
    pub fn new(asset: impl Into<String>, side: OrderSide, price: Decimal, size: Decimal) -> Self {
        Self {
            asset: asset.into(),
            side,
            price,
            size,
            reduce_only: false,
            tif: TimeInForce::default(),
            cloid: None,
        }
    }
}

/// Client for the HyperEVM strategy vault.
pub struct StrategyClient {
    connections: Arc<ChainConnections>,
    dispatcher: Arc<TransactionDispatcher>,
    metadata: MetadataCache,
    info: DynInfoSource,
    resolver: DynResolver,
    bridge: CctpBridge,
    assets: Option<Value>,
    tokens: Option<Value>,
}

impl StrategyClient {
    pub fn new(
        dispatcher: Arc<TransactionDispatcher>,
        info: DynInfoSource,
        resolver: DynResolver,
        iris: DynAttestationClient,
        bridge_config: BridgeConfig,
    ) -> CoreResult<Self> {
        let connections = dispatcher.connections().clone();
        let metadata = MetadataCache::new(info.clone(), connections.precompiles());
        let bridge = CctpBridge::new(dispatcher.clone(), iris, resolver.clone(), bridge_config)?;
        Ok(Self {
            connections,
            dispatcher,
            metadata,
            info,
            resolver,
            bridge,
            assets: None,
            tokens: None,
        })
    }

    /// Wire every collaborator from configuration.
    pub async fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let timeout = config.request_timeout();

        let hyper: DynEvmRpc = Arc::new(
            JsonRpcChain::new(config.hyper_rpc_url.clone(), timeout)
                .map_err(|e| e.into_network(&config.hyper_rpc_url))?,
        );
        let mainnet: DynEvmRpc = Arc::new(
            JsonRpcChain::new(config.mainnet_rpc_url.clone(), timeout)
                .map_err(|e| e.into_network(&config.mainnet_rpc_url))?,
        );
        let connections = Arc::new(ChainConnections::new(
            hyper.clone(),
            mainnet.clone(),
            config.addresses()?,
        ));
        let dispatcher = Arc::new(TransactionDispatcher::new(
            connections,
            config.dispatch_config(),
        ));

        let info: DynInfoSource = Arc::new(
            InfoClient::new(config.info_url(), timeout)
                .map_err(|e| e.into_network(config.info_url()))?,
        );

        let proof_config = config.proof_config()?;
        let verifier_rpc = proof_config.verifier_chain.map(|chain| match chain {
            ChainKind::HyperEvm => hyper.clone(),
            ChainKind::Mainnet => mainnet.clone(),
        });
        let resolver = build_resolver(&proof_config, verifier_rpc).await?;

        let bridge_config = config.bridge_config();
        let iris: DynAttestationClient = Arc::new(
            IrisClient::new(bridge_config.iris_base_url.clone(), timeout).map_err(CoreError::from)?,
        );

        let client = Self::new(dispatcher, info, resolver, iris, bridge_config)?
            .with_registrations(config.assets.clone(), config.tokens.clone());
        info!(
            testnet = config.testnet,
            info_url = %config.info_url(),
            proofs = client.resolver.is_enabled(),
            "Strategy client configured"
        );
        Ok(client)
    }

    /// Asset and token tables registered on every connect.
    #[must_use]
    pub fn with_registrations(mut self, assets: Option<Value>, tokens: Option<Value>) -> Self {
        self.assets = assets;
        self.tokens = tokens;
        self
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect both chains and start a fresh metadata session.
    pub async fn connect(&self) -> CoreResult<()> {
        if let Err(err) = self.connections.connect().await {
            self.disconnect();
            return Err(err);
        }
        self.metadata.reset();
        if let Some(assets) = &self.assets {
            let registered = self.metadata.register_asset_entries(assets);
            debug!(registered, "Registered configured assets");
        }
        if let Some(tokens) = &self.tokens {
            let registered = self.metadata.register_token_entries(tokens);
            debug!(registered, "Registered configured tokens");
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        self.connections.disconnect();
        self.metadata.reset();
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn connections(&self) -> &Arc<ChainConnections> {
        &self.connections
    }

    // =========================================================================
    // Market data
    // =========================================================================

    /// Mid price for `asset` in human units.
    pub async fn get_market_price(&self, asset: &str) -> CoreResult<Decimal> {
        self.connections.ensure_connected()?;
        let (_, prices) = self.market_price_context(asset).await?;
        Ok(prices.mid)
    }

    /// Mid from the BBO precompile (one-sided book uses that side), falling
    /// back to the mark price when the book is empty.
    async fn market_price_context(&self, asset: &str) -> CoreResult<(u32, MarketPrices)> {
        let asset_id = self.metadata.resolve_asset_id(asset).await?;
        let precompiles = self.connections.precompiles();

        let (bid, ask) = match precompiles.bbo(asset_id).await {
            Ok(bbo) => (bbo.bid, bbo.ask),
            Err(err) => {
                warn!(asset, asset_id, error = %err, "BBO precompile unavailable");
                (0, 0)
            }
        };

        let mid = match (bid, ask) {
            (0, 0) => precompiles.mark_px(asset_id).await?,
            (bid, 0) => bid,
            (0, ask) => ask,
            (bid, ask) => bid / 2 + ask / 2 + (bid % 2 + ask % 2) / 2,
        };

        let prices = self
            .metadata
            .convert_market_prices(asset_id, mid, bid, ask)
            .await?;
        if prices.mid <= Decimal::ZERO {
            return Err(CoreError::network(
                "Failed to convert market price to valid Decimal",
                self.connections.rpc(ChainKind::HyperEvm).endpoint(),
            )
            .with_details(format!("asset={asset} asset_id={asset_id} mid_units={mid}")));
        }

        info!(
            asset,
            asset_id,
            mid = %prices.mid,
            bid = ?prices.bid,
            ask = ?prices.ask,
            "Market price"
        );
        Ok((asset_id, prices))
    }

    /// Mid moved by `slippage` against the taker, rounded to the tick rules.
    async fn slippage_price(
        &self,
        asset_id: u32,
        mid: Decimal,
        side: OrderSide,
        slippage: Decimal,
    ) -> CoreResult<Decimal> {
        if mid <= Decimal::ZERO {
            return Err(CoreError::validation("Mid price must be positive", "mid_price", mid));
        }
        if slippage < Decimal::ZERO {
            return Err(CoreError::validation(
                "Slippage must be non-negative",
                "slippage",
                slippage,
            ));
        }
        if slippage >= Decimal::ONE {
            return Err(CoreError::validation(
                "Slippage must be less than 1 (100%)",
                "slippage",
                slippage,
            ));
        }

        let multiplier = if side.is_buy() {
            Decimal::ONE + slippage
        } else {
            Decimal::ONE - slippage
        };
        self.metadata.format_limit_price(asset_id, mid * multiplier).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn limit_order(&self, order: &LimitOrder) -> ActionResponse {
        let response = respond("limit_order", self.try_limit_order(order).await);
        match order.cloid {
            Some(cloid) => response.with_cloid(cloid.to_string()),
            None => response,
        }
    }

    async fn try_limit_order(&self, order: &LimitOrder) -> CoreResult<ActionResponse> {
        self.connections.ensure_connected()?;
        if order.size <= Decimal::ZERO {
            return Err(CoreError::validation("Order size must be positive", "sz", order.size));
        }
        if order.price <= Decimal::ZERO {
            return Err(CoreError::validation(
                "Limit price must be positive",
                "limit_px",
                order.price,
            ));
        }

        let asset = self.metadata.resolve_asset_id(&order.asset).await?;
        let price = self.metadata.format_limit_price(asset, order.price).await?;
        let limit_px = to_fixed_point(price, WIRE_DECIMALS)?;
        let sz = to_fixed_point(order.size, WIRE_DECIMALS)?;
        let tif = order.tif.as_u8();
        let cloid = order.cloid.map_or(0, |c| c.as_u128());

        let mut context = Map::new();
        context.insert("asset".into(), json!(asset));
        context.insert("is_buy".into(), json!(order.side.is_buy()));
        context.insert("limit_px".into(), json!(limit_px));
        context.insert("sz".into(), json!(sz));
        context.insert("reduce_only".into(), json!(order.reduce_only));
        context.insert("tif".into(), json!(tif));
        if let Some(c) = order.cloid {
            context.insert("cloid".into(), json!(c.to_string()));
        }

        let payload = self.payload(LIMIT_ORDER_PROOF)?;
        debug!(
            asset,
            side = %order.side,
            price = %price,
            size = %order.size,
            tif = %order.tif,
            "Placing limit order"
        );

        let tx = match order.side {
            OrderSide::Buy => {
                let call = IHyperliquidStrategy::placeLimitBuyOrderCall {
                    asset,
                    limitPx: limit_px,
                    sz,
                    reduceOnly: order.reduce_only,
                    tif,
                    cloid,
                    payload,
                };
                self.dispatcher
                    .send(ChainKind::HyperEvm, &call, "limit_order", context)
                    .await?
            }
            OrderSide::Sell => {
                let call = IHyperliquidStrategy::placeLimitSellOrderCall {
                    asset,
                    limitPx: limit_px,
                    sz,
                    reduceOnly: order.reduce_only,
                    tif,
                    cloid,
                    payload,
                };
                self.dispatcher
                    .send(ChainKind::HyperEvm, &call, "limit_order", context)
                    .await?
            }
        };
        Ok(ActionResponse::from_tx(&tx))
    }

    /// IOC order priced `slippage` through the current mid.
    pub async fn market_order(
        &self,
        asset: &str,
        side: OrderSide,
        size: Decimal,
        slippage: Decimal,
        cloid: Option<Cloid>,
    ) -> ActionResponse {
        let limit_price = match self.market_limit_price(asset, side, slippage).await {
            Ok(price) => price,
            Err(err) => {
                warn!(asset, error = %err, "Failed to compute market order price");
                let response = ActionResponse::failure(err);
                return match cloid {
                    Some(cloid) => response.with_cloid(cloid.to_string()),
                    None => response,
                };
            }
        };

        info!(asset, side = %side, slippage = %slippage, limit_px = %limit_price, "Market order limit");
        let order = LimitOrder {
            asset: asset.to_string(),
            side,
            price: limit_price,
            size,
            reduce_only: false,
            tif: TimeInForce::ImmediateOrCancel,
            cloid,
        };
        self.limit_order(&order).await
    }

    async fn market_limit_price(
        &self,
        asset: &str,
        side: OrderSide,
        slippage: Decimal,
    ) -> CoreResult<Decimal> {
        self.connections.ensure_connected()?;
        let (asset_id, prices) = self.market_price_context(asset).await?;
        self.slippage_price(asset_id, prices.mid, side, slippage).await
    }

    /// Reduce-only IOC against the subvault's open position.
    ///
    /// `size` defaults to the whole position.
    pub async fn market_close_position(
        &self,
        asset: &str,
        size: Option<Decimal>,
        slippage: Decimal,
        cloid: Option<Cloid>,
    ) -> ActionResponse {
        let order = match self.close_order(asset, size, slippage, cloid).await {
            Ok(order) => order,
            Err(err) => {
                let response = respond("market_close_position", Err(err));
                return match cloid {
                    Some(cloid) => response.with_cloid(cloid.to_string()),
                    None => response,
                };
            }
        };
        self.limit_order(&order).await
    }

    async fn close_order(
        &self,
        asset: &str,
        size: Option<Decimal>,
        slippage: Decimal,
        cloid: Option<Cloid>,
    ) -> CoreResult<LimitOrder> {
        self.connections.ensure_connected()?;
        let trader = self.connections.subvault().await?;

        let state = self
            .info
            .fetch_clearinghouse_state(trader.to_string())
            .await
            .map_err(|e| e.into_network(self.info.endpoint()))?;

        let no_position = || CoreError::validation(
            format!("No open position found for asset {asset}"),
            "asset",
            asset,
        );
        let position = state.position_for(asset).ok_or_else(no_position)?;
        let position_size = position.size_decimal().map_err(|e| {
            CoreError::validation(
                format!("Unable to parse current position size: {e}"),
                "szi",
                &position.szi,
            )
        })?;
        if position_size.is_zero() {
            return Err(no_position());
        }

        let side = if position_size < Decimal::ZERO {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let target = size.unwrap_or_else(|| position_size.abs());
        if target <= Decimal::ZERO {
            return Err(CoreError::validation("Close size must be positive", "size", target));
        }

        let (asset_id, prices) = self.market_price_context(asset).await?;
        let price = self.slippage_price(asset_id, prices.mid, side, slippage).await?;
        info!(
            asset,
            subvault = %trader,
            position = %position_size,
            close_size = %target,
            limit_px = %price,
            "Closing position"
        );

        Ok(LimitOrder {
            asset: asset.to_string(),
            side,
            price,
            size: target,
            reduce_only: true,
            tif: TimeInForce::ImmediateOrCancel,
            cloid,
        })
    }

    pub async fn cancel_order_by_oid(&self, asset: &str, oid: u64) -> ActionResponse {
        respond("cancel_order_by_oid", self.try_cancel_by_oid(asset, oid).await)
    }

    async fn try_cancel_by_oid(&self, asset: &str, oid: u64) -> CoreResult<ActionResponse> {
        self.connections.ensure_connected()?;
        let asset = self.metadata.resolve_asset_id(asset).await?;
        let mut context = Map::new();
        context.insert("asset".into(), json!(asset));
        context.insert("oid".into(), json!(oid));

        let call = IHyperliquidStrategy::cancelOrderByOidCall {
            asset,
            oid,
            payload: self.payload(CANCEL_OID_PROOF)?,
        };
        let tx = self
            .dispatcher
            .send(ChainKind::HyperEvm, &call, "cancel_order_by_oid", context)
            .await?;
        Ok(ActionResponse::from_tx(&tx).with_cancelled(1))
    }

    pub async fn cancel_order_by_cloid(&self, asset: &str, cloid: Cloid) -> ActionResponse {
        respond(
            "cancel_order_by_cloid",
            self.try_cancel_by_cloid(asset, cloid).await,
        )
        .with_cloid(cloid.to_string())
    }

    async fn try_cancel_by_cloid(&self, asset: &str, cloid: Cloid) -> CoreResult<ActionResponse> {
        self.connections.ensure_connected()?;
        let asset = self.metadata.resolve_asset_id(asset).await?;
        let mut context = Map::new();
        context.insert("asset".into(), json!(asset));
        context.insert("cloid".into(), json!(cloid.to_string()));

        let call = IHyperliquidStrategy::cancelOrderByCloidCall {
            asset,
            cloid: cloid.as_u128(),
            payload: self.payload(CANCEL_CLOID_PROOF)?,
        };
        let tx = self
            .dispatcher
            .send(ChainKind::HyperEvm, &call, "cancel_order_by_cloid", context)
            .await?;
        Ok(ActionResponse::from_tx(&tx).with_cancelled(1))
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Move USDC from the spot to the perp balance.
    pub async fn usd_class_transfer_to_perp(&self, amount: Decimal) -> ActionResponse {
        respond(
            "usd_class_transfer_to_perp",
            self.try_usd_class_transfer(amount, true).await,
        )
    }

    /// Move USDC from the perp to the spot balance.
    pub async fn usd_class_transfer_to_spot(&self, amount: Decimal) -> ActionResponse {
        respond(
            "usd_class_transfer_to_spot",
            self.try_usd_class_transfer(amount, false).await,
        )
    }

    async fn try_usd_class_transfer(
        &self,
        amount: Decimal,
        to_perp: bool,
    ) -> CoreResult<ActionResponse> {
        self.connections.ensure_connected()?;
        if amount <= Decimal::ZERO {
            return Err(CoreError::validation(
                "Transfer amount must be positive",
                "amount",
                amount,
            ));
        }
        let units = to_fixed_point(amount, USD_DECIMALS)?;
        let mut context = Map::new();
        context.insert("amount".into(), json!(units));

        let payload = self.payload(USD_TRANSFER_PROOF)?;
        let tx = if to_perp {
            let call = IHyperliquidStrategy::transferSpotToPerpCall {
                amount: units,
                payload,
            };
            self.dispatcher
                .send(ChainKind::HyperEvm, &call, "usd_class_transfer_to_perp", context)
                .await?
        } else {
            let call = IHyperliquidStrategy::transferPerpToSpotCall {
                amount: units,
                payload,
            };
            self.dispatcher
                .send(ChainKind::HyperEvm, &call, "usd_class_transfer_to_spot", context)
                .await?
        };
        Ok(ActionResponse::from_tx(&tx).with_amount(amount))
    }

    /// Withdraw a spot token from Core to the strategy's EVM account.
    ///
    /// HYPE (by symbol or by the session's HYPE token index) uses
    /// `withdrawHypeToEvm`; other tokens resolve through the token table.
    pub async fn spot_send(&self, recipient: &str, token: &str, amount: Decimal) -> ActionResponse {
        respond(
            "spot_send",
            self.try_spot_send(recipient, token, amount).await,
        )
        .with_recipient(recipient)
    }

    async fn try_spot_send(
        &self,
        recipient: &str,
        token: &str,
        amount: Decimal,
    ) -> CoreResult<ActionResponse> {
        self.connections.ensure_connected()?;
        if amount <= Decimal::ZERO {
            return Err(CoreError::validation(
                "Send amount must be positive",
                "amount",
                amount,
            ));
        }
        let units = to_fixed_point(amount, WIRE_DECIMALS)?;
        let mut context = Map::new();
        context.insert("token".into(), json!(token));
        context.insert("amount".into(), json!(units));
        context.insert("recipient".into(), json!(recipient));

        let payload = self.payload(SPOT_SEND_PROOF)?;
        let tx = if self.is_hype_token(token) {
            let call = IHyperliquidStrategy::withdrawHypeToEvmCall {
                amount: units,
                payload,
            };
            self.dispatcher
                .send(ChainKind::HyperEvm, &call, "spot_send", context)
                .await?
        } else {
            let token_index = self.metadata.resolve_token_index(token)?;
            let call = IHyperliquidStrategy::withdrawTokenToEvmCall {
                token: token_index,
                amount: units,
                payload,
            };
            self.dispatcher
                .send(ChainKind::HyperEvm, &call, "spot_send", context)
                .await?
        };
        Ok(ActionResponse::from_tx(&tx).with_amount(amount))
    }

    fn is_hype_token(&self, token: &str) -> bool {
        if token.trim().eq_ignore_ascii_case("HYPE") {
            return true;
        }
        match self.connections.hype_token_index() {
            Some(index) => self.metadata.resolve_token_index(token).ok() == Some(index),
            None => false,
        }
    }

    // =========================================================================
    // Bridge
    // =========================================================================

    pub async fn bridge_mainnet_to_hyperliquid(&self, request: &BridgeRequest) -> ActionResponse {
        self.bridge.bridge_mainnet_to_hyperliquid(request).await
    }

    pub async fn bridge_hyperliquid_to_mainnet(&self, request: &BridgeRequest) -> ActionResponse {
        self.bridge.bridge_hyperliquid_to_mainnet(request).await
    }

    /// Strategy subvault holding the Core positions.
    pub async fn subvault(&self) -> CoreResult<Address> {
        self.connections.subvault().await
    }

    /// Payload for a HyperEVM action, from the HyperEVM dataset.
    fn payload(&self, description: &str) -> CoreResult<VerificationPayload> {
        let dataset = self.resolver.dataset_for_chain(ChainKind::HyperEvm);
        let payload = self.resolver.resolve(description, &dataset)?;
        Ok(VerificationPayload::from(&payload))
    }
}

/// Turn an action result into the response callers see.
fn respond(action: &str, result: CoreResult<ActionResponse>) -> ActionResponse {
    result.unwrap_or_else(|err| {
        warn!(action, kind = err.kind(), error = %err, "Action failed");
        ActionResponse::failure(err)
    })
}
