//! HyperEVM L1 read precompiles.
//!
//! Precompiles take raw ABI-encoded arguments with no selector and return an
//! ABI-encoded value.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{SolType, SolValue};
use hlvault_core::{CoreError, CoreResult};
use tracing::debug;

use crate::abi::{
    Bbo, PerpAssetInfo, SpotInfo, TokenInfo, BBO_PRECOMPILE, CORE_USER_EXISTS_PRECOMPILE,
    MARK_PX_PRECOMPILE, PERP_ASSET_INFO_PRECOMPILE, SPOT_INFO_PRECOMPILE, TOKEN_INFO_PRECOMPILE,
};
use crate::rpc::DynEvmRpc;

/// Reader for the L1 read precompiles on HyperEVM.
#[derive(Clone)]
pub struct PrecompileReader {
    rpc: DynEvmRpc,
}

impl PrecompileReader {
    pub fn new(rpc: DynEvmRpc) -> Self {
        Self { rpc }
    }

    async fn read<T>(
        &self,
        precompile: Address,
        input: Vec<u8>,
        what: &str,
    ) -> CoreResult<T>
    where
        T: SolValue + From<<T::SolType as SolType>::RustType>,
    {
        let raw = self
            .rpc
            .call(precompile, Bytes::from(input))
            .await
            .map_err(|e| {
                CoreError::network("Failed to execute L1 read precompile", format!("{precompile:?}"))
                    .with_details(e.to_string())
            })?;

        debug!(precompile = ?precompile, what, len = raw.len(), "Precompile response");

        T::abi_decode(&raw, true).map_err(|e| {
            CoreError::network(
                "Failed to decode L1 read precompile response",
                format!("{precompile:?}"),
            )
            .with_details(format!("{what}: {e}"))
        })
    }

    pub async fn perp_asset_info(&self, asset_id: u32) -> CoreResult<PerpAssetInfo> {
        self.read(PERP_ASSET_INFO_PRECOMPILE, asset_id.abi_encode(), "perpAssetInfo")
            .await
    }

    pub async fn spot_info(&self, spot_id: u32) -> CoreResult<SpotInfo> {
        self.read(SPOT_INFO_PRECOMPILE, spot_id.abi_encode(), "spotInfo")
            .await
    }

    pub async fn token_info(&self, token_id: u32) -> CoreResult<TokenInfo> {
        self.read(TOKEN_INFO_PRECOMPILE, token_id.abi_encode(), "tokenInfo")
            .await
    }

    /// Best bid and ask as raw `uint64` prices; zero means an empty side.
    pub async fn bbo(&self, asset_id: u32) -> CoreResult<Bbo> {
        self.read(BBO_PRECOMPILE, asset_id.abi_encode(), "bbo").await
    }

    pub async fn mark_px(&self, asset_id: u32) -> CoreResult<u64> {
        self.read(MARK_PX_PRECOMPILE, asset_id.abi_encode(), "markPx")
            .await
    }

    pub async fn core_user_exists(&self, user: Address) -> CoreResult<bool> {
        self.read(CORE_USER_EXISTS_PRECOMPILE, user.abi_encode(), "coreUserExists")
            .await
    }
}
