//! Bridge configuration.

use std::time::Duration;

use hlvault_core::{CoreError, CoreResult};

use crate::iris::{IRIS_MAINNET_URL, IRIS_SANDBOX_URL};

/// CCTP domain of Ethereum mainnet.
pub const MAINNET_DOMAIN: u32 = 0;
/// CCTP domain of HyperEVM.
pub const HYPER_DOMAIN: u32 = 19;
pub const DEFAULT_FINALITY_THRESHOLD: i64 = 1000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: u32 = 100;
/// Upper bound on `poll_interval * max_polls`.
pub const MAX_TOTAL_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub iris_base_url: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Minimum finality threshold requested from Iris.
    pub finality_threshold: i64,
    pub hyper_domain: u32,
    pub mainnet_domain: u32,
}

impl BridgeConfig {
    /// Defaults for testnet (`true`) or mainnet (`false`) Iris.
    pub fn for_network(testnet: bool) -> Self {
        Self {
            iris_base_url: if testnet {
                IRIS_SANDBOX_URL
            } else {
                IRIS_MAINNET_URL
            }
            .to_string(),
            ..Self::default()
        }
    }

    /// Reject poll settings that cannot work or would wait unreasonably long.
    pub fn validate(&self) -> CoreResult<()> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::validation(
                "Poll interval must be positive",
                "iris_poll_interval",
                format!("{:?}", self.poll_interval),
            ));
        }
        if self.max_polls == 0 {
            return Err(CoreError::validation(
                "Max polls must be positive",
                "iris_max_polls",
                self.max_polls,
            ));
        }
        let total = self.poll_interval.saturating_mul(self.max_polls);
        if total > MAX_TOTAL_WAIT {
            return Err(CoreError::validation(
                format!(
                    "Attestation wait of {}s exceeds {}s",
                    total.as_secs(),
                    MAX_TOTAL_WAIT.as_secs()
                ),
                "iris_max_polls",
                self.max_polls,
            ));
        }
        if self.iris_base_url.trim().is_empty() {
            return Err(CoreError::validation(
                "Iris base URL is required",
                "iris_base_url",
                "",
            ));
        }
        Ok(())
    }

    /// Total attestation wait budget.
    pub fn max_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_polls)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            iris_base_url: IRIS_SANDBOX_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            finality_threshold: DEFAULT_FINALITY_THRESHOLD,
            hyper_domain: HYPER_DOMAIN,
            mainnet_domain: MAINNET_DOMAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_wait(), Duration::from_secs(200));
        assert_eq!(
            BridgeConfig::for_network(false).iris_base_url,
            "https://iris-api.circle.com"
        );
    }

    #[test]
    fn test_rejects_bad_polling() {
        let zero_interval = BridgeConfig {
            poll_interval: Duration::ZERO,
            ..BridgeConfig::default()
        };
        assert_eq!(
            zero_interval.validate().unwrap_err().field(),
            Some("iris_poll_interval")
        );

        let zero_polls = BridgeConfig {
            max_polls: 0,
            ..BridgeConfig::default()
        };
        assert!(zero_polls.validate().is_err());

        let too_long = BridgeConfig {
            poll_interval: Duration::from_secs(3600),
            max_polls: 25,
            ..BridgeConfig::default()
        };
        assert!(too_long.validate().is_err());
    }
}
