//! Client configuration.
//!
//! Loaded from TOML. Unset endpoints default from the `testnet` flag; the
//! sender address can be overridden with `HLVAULT_SENDER`.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use hlvault_bridge::config::{
    DEFAULT_FINALITY_THRESHOLD, DEFAULT_MAX_POLLS, HYPER_DOMAIN, MAINNET_DOMAIN,
};
use hlvault_bridge::{BridgeConfig, IRIS_MAINNET_URL, IRIS_SANDBOX_URL};
use hlvault_chain::{ContractAddresses, DispatchConfig};
use hlvault_core::ChainKind;
use hlvault_proofs::{chain_from_label, ProofConfig, ProofSource};
use hlvault_registry::{MAINNET_INFO_URL, TESTNET_INFO_URL};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Env var overriding `sender_address`.
pub const SENDER_ENV: &str = "HLVAULT_SENDER";

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Testnet (default) or mainnet endpoints.
    #[serde(default = "default_testnet")]
    pub testnet: bool,
    /// HyperEVM JSON-RPC endpoint.
    pub hyper_rpc_url: String,
    /// Ethereum JSON-RPC endpoint.
    pub mainnet_rpc_url: String,
    /// Strategy contract on HyperEVM.
    pub strategy_address: String,
    /// Bridge strategy contract on Ethereum.
    pub bridge_strategy_address: String,
    /// Account the nodes sign for.
    #[serde(default)]
    pub sender_address: Option<String>,
    /// Info endpoint. Defaults from `testnet`.
    #[serde(default)]
    pub info_url: Option<String>,
    /// HTTP timeout for RPC, info, Iris and proof requests (ms). Default: 10,000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub proofs: ProofSection,
    /// Symbol -> asset id pairs registered at connect.
    #[serde(default)]
    pub assets: Option<Value>,
    /// Symbol -> token index pairs registered at connect.
    #[serde(default)]
    pub tokens: Option<Value>,
}

fn default_testnet() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Receipt handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    #[serde(default = "default_wait_for_receipt")]
    pub wait_for_receipt: bool,
    /// Default: 120,000 (2 minutes).
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Default: 1,000.
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

fn default_wait_for_receipt() -> bool {
    true
}

fn default_receipt_timeout_ms() -> u64 {
    120_000
}

fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            wait_for_receipt: default_wait_for_receipt(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
        }
    }
}

/// CCTP bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSection {
    /// Iris base URL. Defaults from `testnet`.
    #[serde(default)]
    pub iris_base_url: Option<String>,
    /// Default: 2,000.
    #[serde(default = "default_iris_poll_interval_ms")]
    pub iris_poll_interval_ms: u64,
    /// Default: 100.
    #[serde(default = "default_iris_max_polls")]
    pub iris_max_polls: u32,
    /// Default: 1000.
    #[serde(default = "default_finality_threshold")]
    pub finality_threshold: i64,
    #[serde(default = "default_hyper_domain")]
    pub hyper_domain: u32,
    #[serde(default = "default_mainnet_domain")]
    pub mainnet_domain: u32,
}

fn default_iris_poll_interval_ms() -> u64 {
    2_000
}

fn default_iris_max_polls() -> u32 {
    DEFAULT_MAX_POLLS
}

fn default_finality_threshold() -> i64 {
    DEFAULT_FINALITY_THRESHOLD
}

fn default_hyper_domain() -> u32 {
    HYPER_DOMAIN
}

fn default_mainnet_domain() -> u32 {
    MAINNET_DOMAIN
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            iris_base_url: None,
            iris_poll_interval_ms: default_iris_poll_interval_ms(),
            iris_max_polls: default_iris_max_polls(),
            finality_threshold: default_finality_threshold(),
            hyper_domain: default_hyper_domain(),
            mainnet_domain: default_mainnet_domain(),
        }
    }
}

/// Verification payload sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofSection {
    /// Always send the default payload.
    #[serde(default)]
    pub disabled: bool,
    /// https URLs serving proof dataset JSON.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Inline dataset documents.
    #[serde(default)]
    pub inline: Vec<Value>,
    /// Verifier contract whose `merkleRoot()` must match each dataset.
    #[serde(default)]
    pub verifier_address: Option<String>,
    /// Chain hosting the verifier (`hyper` or `mainnet`). Default: hyper.
    #[serde(default)]
    pub verifier_network: Option<String>,
}

impl ClientConfig {
    /// Load from a TOML file, apply env overrides and default URLs.
    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config.with_env_overrides().with_defaulted_urls())
    }

    /// Take `sender_address` from `HLVAULT_SENDER` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(sender) = std::env::var(SENDER_ENV) {
            if !sender.trim().is_empty() {
                self.sender_address = Some(sender.trim().to_string());
            }
        }
        self
    }

    /// Fill in info and Iris URLs for the selected network and strip
    /// trailing slashes.
    #[must_use]
    pub fn with_defaulted_urls(mut self) -> Self {
        let info_url = self.info_url.take().unwrap_or_else(|| {
            if self.testnet {
                TESTNET_INFO_URL
            } else {
                MAINNET_INFO_URL
            }
            .to_string()
        });
        self.info_url = Some(info_url.trim_end_matches('/').to_string());

        let iris_url = self.bridge.iris_base_url.take().unwrap_or_else(|| {
            if self.testnet {
                IRIS_SANDBOX_URL
            } else {
                IRIS_MAINNET_URL
            }
            .to_string()
        });
        self.bridge.iris_base_url = Some(iris_url.trim_end_matches('/').to_string());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn info_url(&self) -> &str {
        self.info_url.as_deref().unwrap_or(if self.testnet {
            TESTNET_INFO_URL
        } else {
            MAINNET_INFO_URL
        })
    }

    pub fn addresses(&self) -> ClientResult<ContractAddresses> {
        let sender = self.sender_address.as_deref().ok_or_else(|| {
            ClientError::Config(format!(
                "sender_address is required (or set {SENDER_ENV})"
            ))
        })?;
        Ok(ContractAddresses {
            strategy: parse_address("strategy_address", &self.strategy_address)?,
            bridge_strategy: parse_address(
                "bridge_strategy_address",
                &self.bridge_strategy_address,
            )?,
            sender: parse_address("sender_address", sender)?,
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            wait_for_receipt: self.dispatch.wait_for_receipt,
            receipt_timeout: Duration::from_millis(self.dispatch.receipt_timeout_ms),
            receipt_poll_interval: Duration::from_millis(self.dispatch.receipt_poll_interval_ms),
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let defaults = BridgeConfig::for_network(self.testnet);
        BridgeConfig {
            iris_base_url: self
                .bridge
                .iris_base_url
                .clone()
                .unwrap_or(defaults.iris_base_url),
            poll_interval: Duration::from_millis(self.bridge.iris_poll_interval_ms),
            max_polls: self.bridge.iris_max_polls,
            finality_threshold: self.bridge.finality_threshold,
            hyper_domain: self.bridge.hyper_domain,
            mainnet_domain: self.bridge.mainnet_domain,
        }
    }

    pub fn proof_config(&self) -> ClientResult<ProofConfig> {
        let mut sources: Vec<ProofSource> = self
            .proofs
            .inline
            .iter()
            .cloned()
            .map(ProofSource::Inline)
            .collect();
        sources.extend(self.proofs.urls.iter().cloned().map(ProofSource::Url));

        let verifier = self
            .proofs
            .verifier_address
            .as_deref()
            .map(|raw| parse_address("proofs.verifier_address", raw))
            .transpose()?;

        let verifier_chain = match self.proofs.verifier_network.as_deref() {
            None => verifier.map(|_| ChainKind::HyperEvm),
            Some(label) => Some(chain_from_label(label).ok_or_else(|| {
                ClientError::Config(format!("Unknown proof verifier network '{label}'"))
            })?),
        };

        Ok(ProofConfig {
            disabled: self.proofs.disabled,
            sources,
            verifier,
            verifier_chain,
            request_timeout: self.request_timeout(),
        })
    }

    /// Check everything needed to build a client.
    pub fn validate(&self) -> ClientResult<()> {
        if self.hyper_rpc_url.trim().is_empty() {
            return Err(ClientError::Config("hyper_rpc_url is required".to_string()));
        }
        if self.mainnet_rpc_url.trim().is_empty() {
            return Err(ClientError::Config("mainnet_rpc_url is required".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        self.addresses()?;
        self.proof_config()?;
        self.bridge_config().validate()?;
        Ok(())
    }
}

fn parse_address(field: &str, raw: &str) -> ClientResult<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| ClientError::Config(format!("Invalid {field} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        hyper_rpc_url = "http://127.0.0.1:8545"
        mainnet_rpc_url = "http://127.0.0.1:8546"
        strategy_address = "0x5151515151515151515151515151515151515151"
        bridge_strategy_address = "0x5252525252525252525252525252525252525252"
        sender_address = "0x5353535353535353535353535353535353535353"
    "#;

    #[test]
    fn test_defaults_fill_in() {
        let config: ClientConfig = toml::from_str(MINIMAL).unwrap();
        let config = config.with_defaulted_urls();
        assert!(config.testnet);
        assert_eq!(config.info_url(), TESTNET_INFO_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));

        let dispatch = config.dispatch_config();
        assert!(dispatch.wait_for_receipt);
        assert_eq!(dispatch.receipt_timeout, Duration::from_secs(120));

        let bridge = config.bridge_config();
        assert_eq!(bridge.iris_base_url, IRIS_SANDBOX_URL);
        assert_eq!(bridge.poll_interval, Duration::from_secs(2));
        assert_eq!(bridge.max_polls, 100);
        assert_eq!(bridge.finality_threshold, 1000);
        assert_eq!((bridge.hyper_domain, bridge.mainnet_domain), (19, 0));

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mainnet_urls_and_trailing_slash() {
        let raw = format!(
            "testnet = false\n{MINIMAL}\n[bridge]\niris_base_url = \"https://iris.example/\"\n"
        );
        let config: ClientConfig = toml::from_str(&raw).unwrap();
        let config = config.with_defaulted_urls();
        assert_eq!(config.info_url(), MAINNET_INFO_URL);
        assert_eq!(config.bridge_config().iris_base_url, "https://iris.example");
    }

    #[test]
    fn test_proof_section() {
        let raw = format!(
            r#"{MINIMAL}
            [proofs]
            urls = ["https://proofs.example/vault.json"]
            verifier_address = "0x7777777777777777777777777777777777777777"

            [[proofs.inline]]
            title = "HyperEVM vault"
            merkle_root = "0x0101010101010101010101010101010101010101010101010101010101010101"
            merkle_proofs = []
            "#
        );
        let config: ClientConfig = toml::from_str(&raw).unwrap();
        let proofs = config.proof_config().unwrap();
        assert_eq!(proofs.sources.len(), 2);
        assert!(matches!(&proofs.sources[0], ProofSource::Inline(v) if v["title"] == "HyperEVM vault"));
        assert!(matches!(&proofs.sources[1], ProofSource::Url(u) if u.ends_with("vault.json")));
        assert_eq!(proofs.verifier_chain, Some(ChainKind::HyperEvm));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config: ClientConfig = toml::from_str(MINIMAL).unwrap();
        config.strategy_address = "not-an-address".to_string();
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        let mut config: ClientConfig = toml::from_str(MINIMAL).unwrap();
        config.sender_address = None;
        assert!(config.addresses().is_err());

        let mut config: ClientConfig = toml::from_str(MINIMAL).unwrap();
        config.proofs.verifier_network = Some("solana".to_string());
        assert!(config.proof_config().is_err());

        let mut config: ClientConfig = toml::from_str(MINIMAL).unwrap();
        config.bridge.iris_max_polls = 0;
        assert!(matches!(config.validate(), Err(ClientError::Core(_))));
    }
}
