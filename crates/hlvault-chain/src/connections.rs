//! Connection lifecycle for the HyperEVM and mainnet nodes.
//!
//! Holds both RPC handles, the sender address, and the strategy contract
//! addresses. `connect` checks both nodes and caches the few values read
//! once per session (HYPE token index, validated subvault).

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use hlvault_core::{ChainKind, CoreError, CoreResult};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::abi::IHyperliquidStrategy;
use crate::precompile::PrecompileReader;
use crate::rpc::DynEvmRpc;

/// Static wiring for `ChainConnections`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddresses {
    /// Strategy contract on HyperEVM.
    pub strategy: Address,
    /// Bridge strategy contract on mainnet.
    pub bridge_strategy: Address,
    /// Account the node signs for.
    pub sender: Address,
}

#[derive(Debug, Default)]
struct SessionState {
    connected: bool,
    hyper_chain_id: Option<u64>,
    mainnet_chain_id: Option<u64>,
    hype_token_index: Option<u64>,
    subvault: Option<Address>,
}

/// Both chains plus per-session state.
pub struct ChainConnections {
    hyper: DynEvmRpc,
    mainnet: DynEvmRpc,
    addresses: ContractAddresses,
    state: RwLock<SessionState>,
}

impl ChainConnections {
    pub fn new(hyper: DynEvmRpc, mainnet: DynEvmRpc, addresses: ContractAddresses) -> Self {
        Self {
            hyper,
            mainnet,
            addresses,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Check both nodes and read session constants.
    pub async fn connect(&self) -> CoreResult<()> {
        let hyper_chain_id = self.hyper.chain_id().await.map_err(|e| {
            CoreError::network("Unable to connect to HyperLiquid RPC", self.hyper.endpoint())
                .with_details(e.to_string())
        })?;
        let mainnet_chain_id = self.mainnet.chain_id().await.map_err(|e| {
            CoreError::network("Unable to connect to Mainnet RPC", self.mainnet.endpoint())
                .with_details(e.to_string())
        })?;

        let hype_token_index = match self
            .call_view(
                ChainKind::HyperEvm,
                self.addresses.strategy,
                IHyperliquidStrategy::hypeTokenIndexCall {},
            )
            .await
        {
            Ok(ret) => Some(ret._0),
            Err(err) => {
                debug!(error = %err, "hypeTokenIndex unavailable");
                None
            }
        };

        {
            let mut state = self.state.write();
            *state = SessionState {
                connected: true,
                hyper_chain_id: Some(hyper_chain_id),
                mainnet_chain_id: Some(mainnet_chain_id),
                hype_token_index,
                subvault: None,
            };
        }

        info!(
            url = %self.hyper.endpoint(),
            chain_id = hyper_chain_id,
            "Connected to HyperLiquid RPC"
        );
        info!(
            url = %self.mainnet.endpoint(),
            chain_id = mainnet_chain_id,
            "Connected to mainnet RPC"
        );
        Ok(())
    }

    pub fn disconnect(&self) {
        *self.state.write() = SessionState::default();
        info!("Disconnected from EVM nodes");
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn ensure_connected(&self) -> CoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CoreError::network(
                "EVM connector is not connected",
                self.hyper.endpoint(),
            ))
        }
    }

    pub fn rpc(&self, chain: ChainKind) -> &DynEvmRpc {
        match chain {
            ChainKind::HyperEvm => &self.hyper,
            ChainKind::Mainnet => &self.mainnet,
        }
    }

    /// Strategy contract that receives calls on `chain`.
    pub fn contract(&self, chain: ChainKind) -> Address {
        match chain {
            ChainKind::HyperEvm => self.addresses.strategy,
            ChainKind::Mainnet => self.addresses.bridge_strategy,
        }
    }

    pub fn sender(&self) -> Address {
        self.addresses.sender
    }

    pub fn chain_id(&self, chain: ChainKind) -> Option<u64> {
        let state = self.state.read();
        match chain {
            ChainKind::HyperEvm => state.hyper_chain_id,
            ChainKind::Mainnet => state.mainnet_chain_id,
        }
    }

    pub fn hype_token_index(&self) -> Option<u64> {
        self.state.read().hype_token_index
    }

    pub fn precompiles(&self) -> PrecompileReader {
        PrecompileReader::new(self.hyper.clone())
    }

    /// `eth_call` a view function and decode its return.
    pub async fn call_view<C: SolCall>(
        &self,
        chain: ChainKind,
        to: Address,
        call: C,
    ) -> CoreResult<C::Return> {
        let rpc = self.rpc(chain);
        let raw = rpc
            .call(to, Bytes::from(call.abi_encode()))
            .await
            .map_err(|e| e.into_network(rpc.endpoint()))?;
        C::abi_decode_returns(&raw, true).map_err(|e| {
            CoreError::network(
                format!("Failed to decode {} return", crate::abi::function_name::<C>()),
                rpc.endpoint(),
            )
            .with_details(e.to_string())
        })
    }

    /// Strategy subvault, read once per session.
    ///
    /// Fails validation when the contract reports the zero address or the
    /// subvault is unknown to HyperLiquid core.
    pub async fn subvault(&self) -> CoreResult<Address> {
        self.ensure_connected()?;
        if let Some(subvault) = self.state.read().subvault {
            return Ok(subvault);
        }

        let subvault = self
            .call_view(
                ChainKind::HyperEvm,
                self.addresses.strategy,
                IHyperliquidStrategy::subvaultCall {},
            )
            .await
            .map_err(|e| {
                CoreError::validation("Unable to read strategy subvault address", "subvault", e)
            })?
            ._0;

        if subvault.is_zero() {
            return Err(CoreError::validation(
                "Strategy contract does not define a subvault address",
                "subvault",
                subvault,
            ));
        }

        if !self.precompiles().core_user_exists(subvault).await? {
            warn!(subvault = %subvault, "Subvault missing on HyperLiquid core");
            return Err(CoreError::validation(
                "Strategy subvault is not registered on HyperLiquid core",
                "subvault",
                subvault,
            ));
        }

        self.state.write().subvault = Some(subvault);
        Ok(subvault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::abi::CORE_USER_EXISTS_PRECOMPILE;
    use crate::mock::MockEvmRpc;
    use alloy::sol_types::SolValue;

    pub(crate) fn addresses() -> ContractAddresses {
        ContractAddresses {
            strategy: Address::repeat_byte(0x51),
            bridge_strategy: Address::repeat_byte(0x52),
            sender: Address::repeat_byte(0x53),
        }
    }

    fn setup() -> (Arc<MockEvmRpc>, Arc<MockEvmRpc>, ChainConnections) {
        let hyper = Arc::new(MockEvmRpc::new("mock://hyper"));
        let mainnet = Arc::new(MockEvmRpc::new("mock://mainnet"));
        let conns = ChainConnections::new(hyper.clone(), mainnet.clone(), addresses());
        (hyper, mainnet, conns)
    }

    #[tokio::test]
    async fn test_connect_reads_hype_index() {
        let (hyper, _mainnet, conns) = setup();
        hyper.on_call(
            addresses().strategy,
            IHyperliquidStrategy::hypeTokenIndexCall::SELECTOR.to_vec(),
            150u64.abi_encode(),
        );

        assert!(conns.ensure_connected().is_err());
        conns.connect().await.unwrap();
        assert!(conns.is_connected());
        assert_eq!(conns.hype_token_index(), Some(150));
        assert_eq!(conns.chain_id(ChainKind::HyperEvm), Some(999));

        conns.disconnect();
        assert!(!conns.is_connected());
        assert_eq!(conns.hype_token_index(), None);
    }

    #[tokio::test]
    async fn test_connect_tolerates_missing_hype_index() {
        let (_hyper, _mainnet, conns) = setup();
        conns.connect().await.unwrap();
        assert_eq!(conns.hype_token_index(), None);
    }

    #[tokio::test]
    async fn test_connect_fails_when_mainnet_unreachable() {
        let (_hyper, mainnet, conns) = setup();
        mainnet.set_unreachable(true);
        let err = conns.connect().await.unwrap_err();
        assert!(err.is_network());
        assert!(!conns.is_connected());
    }

    #[tokio::test]
    async fn test_subvault_validation() {
        let (hyper, _mainnet, conns) = setup();
        conns.connect().await.unwrap();

        let selector = IHyperliquidStrategy::subvaultCall::SELECTOR.to_vec();
        hyper.on_call(addresses().strategy, selector.clone(), Address::ZERO.abi_encode());
        let err = conns.subvault().await.unwrap_err();
        assert_eq!(err.field(), Some("subvault"));

        let subvault = Address::repeat_byte(0x77);
        hyper.on_call(addresses().strategy, selector, subvault.abi_encode());
        hyper.on_call(CORE_USER_EXISTS_PRECOMPILE, Vec::new(), false.abi_encode());
        assert!(conns.subvault().await.unwrap_err().is_validation());

        hyper.on_call(CORE_USER_EXISTS_PRECOMPILE, Vec::new(), true.abi_encode());
        assert_eq!(conns.subvault().await.unwrap(), subvault);

        // cached for the session
        let before = hyper.calls().len();
        assert_eq!(conns.subvault().await.unwrap(), subvault);
        assert_eq!(hyper.calls().len(), before);
    }
}
