//! CCTP v2 USDC bridging between Ethereum mainnet and HyperEVM.
//!
//! - `amount`: 6-decimal USDC normalization
//! - `iris`: Circle Iris fee quotes and attestation polling
//! - `config`: domains, finality threshold, poll budget
//! - `cctp`: burn, attest, claim orchestration

pub mod amount;
pub mod cctp;
pub mod config;
pub mod error;
pub mod iris;

pub use amount::{normalize_usdc_amount, parse_usdc_amount, NormalizedAmount};
pub use cctp::{BridgeRequest, CctpBridge, CCTP_PAYLOAD_DESCRIPTIONS};
pub use config::{BridgeConfig, HYPER_DOMAIN, MAINNET_DOMAIN};
pub use error::{BridgeError, BridgeResult};
pub use iris::{
    AttestationClient, Attestation, DynAttestationClient, IrisClient, MockAttestationClient,
    MockPoll, PollStatus, IRIS_MAINNET_URL, IRIS_SANDBOX_URL,
};
