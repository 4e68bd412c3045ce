//! Solidity ABI for the strategy contracts, the verifier, and the HyperEVM
//! L1 read precompiles.

use alloy::primitives::{address, Address};
use alloy::sol;

sol! {
    /// `IVerifier.VerificationPayload`.
    struct VerificationPayload {
        uint8 verificationType;
        bytes verificationData;
        bytes32[] proof;
    }

    /// Strategy contract on HyperEVM. Every action is forwarded to CoreWriter.
    interface IHyperliquidStrategy {
        function placeLimitBuyOrder(uint32 asset, uint64 limitPx, uint64 sz, bool reduceOnly, uint8 tif, uint128 cloid, VerificationPayload payload) external;
        function placeLimitSellOrder(uint32 asset, uint64 limitPx, uint64 sz, bool reduceOnly, uint8 tif, uint128 cloid, VerificationPayload payload) external;
        function cancelOrderByOid(uint32 asset, uint64 oid, VerificationPayload payload) external;
        function cancelOrderByCloid(uint32 asset, uint128 cloid, VerificationPayload payload) external;
        function transferSpotToPerp(uint64 amount, VerificationPayload payload) external;
        function transferPerpToSpot(uint64 amount, VerificationPayload payload) external;
        function withdrawHypeToEvm(uint64 amount, VerificationPayload payload) external;
        function withdrawTokenToEvm(uint64 token, uint64 amount, VerificationPayload payload) external;
        function hypeTokenIndex() external view returns (uint64);
        function subvault() external view returns (address);
    }

    /// CCTP v2 entry points, present on both the HyperEVM strategy and the
    /// mainnet bridge strategy.
    interface ICctpBridgeStrategy {
        function bridgeUSDCViaCCTPv2(uint256 amount, uint256 maxFee, uint32 minFinalityThreshold, VerificationPayload[] payloads) external;
        function receiveUSDCViaCCTPv2(bytes message, bytes attestation) external;
    }

    interface IVerifier {
        function merkleRoot() external view returns (bytes32);
    }

    #[derive(Debug)]
    struct PerpAssetInfo {
        string coin;
        uint32 marginTableId;
        uint8 szDecimals;
        uint8 maxLeverage;
        bool onlyIsolated;
    }

    struct SpotInfo {
        string name;
        uint64[2] tokens;
    }

    struct TokenInfo {
        string name;
        uint64[] spots;
        uint64 deployerTradingFeeShare;
        address deployer;
        address evmContract;
        uint8 szDecimals;
        uint8 weiDecimals;
        int8 evmExtraWeiDecimals;
    }

    struct Bbo {
        uint64 bid;
        uint64 ask;
    }
}

pub const MARK_PX_PRECOMPILE: Address = address!("0000000000000000000000000000000000000806");
pub const PERP_ASSET_INFO_PRECOMPILE: Address =
    address!("000000000000000000000000000000000000080a");
pub const SPOT_INFO_PRECOMPILE: Address = address!("000000000000000000000000000000000000080b");
pub const TOKEN_INFO_PRECOMPILE: Address = address!("000000000000000000000000000000000000080c");
pub const BBO_PRECOMPILE: Address = address!("000000000000000000000000000000000000080e");
pub const CORE_USER_EXISTS_PRECOMPILE: Address =
    address!("0000000000000000000000000000000000000810");

impl From<&hlvault_core::VerificationPayload> for VerificationPayload {
    fn from(payload: &hlvault_core::VerificationPayload) -> Self {
        Self {
            verificationType: payload.verification_type,
            verificationData: payload.verification_data.clone(),
            proof: payload.proof.clone(),
        }
    }
}

/// Function name of a `sol!` call, without the parameter list.
pub fn function_name<C: alloy::sol_types::SolCall>() -> &'static str {
    C::SIGNATURE
        .split_once('(')
        .map_or(C::SIGNATURE, |(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, B256};
    use alloy::sol_types::SolCall;

    #[test]
    fn test_function_name() {
        assert_eq!(
            function_name::<IHyperliquidStrategy::placeLimitBuyOrderCall>(),
            "placeLimitBuyOrder"
        );
        assert_eq!(
            function_name::<ICctpBridgeStrategy::receiveUSDCViaCCTPv2Call>(),
            "receiveUSDCViaCCTPv2"
        );
    }

    #[test]
    fn test_limit_order_calldata_layout() {
        let call = IHyperliquidStrategy::placeLimitBuyOrderCall {
            asset: 4,
            limitPx: 350_910_000_000,
            sz: 10_000_000,
            reduceOnly: false,
            tif: 2,
            cloid: 0,
            payload: (&hlvault_core::VerificationPayload::default()).into(),
        };
        let data = call.abi_encode();
        assert_eq!(&data[..4], IHyperliquidStrategy::placeLimitBuyOrderCall::SELECTOR);
        // asset is the first head word
        assert_eq!(data[4 + 31], 4);

        let decoded = IHyperliquidStrategy::placeLimitBuyOrderCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.limitPx, 350_910_000_000);
        assert_eq!(decoded.payload.verificationType, 0);
    }

    #[test]
    fn test_payload_conversion() {
        let payload = hlvault_core::VerificationPayload::new(
            2,
            Bytes::from(vec![1, 2, 3]),
            vec![B256::repeat_byte(7)],
        );
        let converted = VerificationPayload::from(&payload);
        assert_eq!(converted.verificationType, 2);
        assert_eq!(converted.verificationData.as_ref(), &[1, 2, 3]);
        assert_eq!(converted.proof, vec![B256::repeat_byte(7)]);
    }
}
