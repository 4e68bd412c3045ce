//! Verification payload resolution.
//!
//! Two implementations sit behind `VerificationResolver`:
//! - `DisabledResolver`: every call gets the default payload
//! - `DatasetResolver`: payloads come from loaded proof datasets, optionally
//!   checked against an on-chain verifier root

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::SolCall;
use hlvault_chain::abi::IVerifier;
use hlvault_chain::DynEvmRpc;
use hlvault_core::{ChainKind, CoreResult, VerificationPayload};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::dataset::ProofDataset;
use crate::error::{ProofError, ProofResult};
use crate::source::{ProofFetcher, ProofSource};

/// Dataset title used when no dataset is configured.
pub const DEFAULT_DATASET: &str = "default";

/// Supplies the verification payload a contract call needs.
pub trait VerificationResolver: Send + Sync {
    /// Payload for `description` in the dataset titled `dataset`.
    fn resolve(&self, description: &str, dataset: &str) -> CoreResult<VerificationPayload>;

    /// Loaded dataset titles, in load order.
    fn dataset_titles(&self) -> Vec<String>;

    fn is_enabled(&self) -> bool;

    /// Dataset to use for calls sent to `chain`.
    ///
    /// Prefers a title naming the chain, then the first dataset, then
    /// `"default"`.
    fn dataset_for_chain(&self, chain: ChainKind) -> String {
        let titles = self.dataset_titles();
        let needles: &[&str] = match chain {
            ChainKind::HyperEvm => &["hyperevm", "hyperliquid"],
            ChainKind::Mainnet => &["mainnet", "ethereum"],
        };
        titles
            .iter()
            .find(|title| {
                let lowered = title.to_lowercase();
                needles.iter().any(|needle| lowered.contains(needle))
            })
            .or_else(|| titles.first())
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATASET.to_string())
    }
}

pub type DynResolver = Arc<dyn VerificationResolver>;

/// Resolver for contracts that do not enforce proofs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledResolver;

impl VerificationResolver for DisabledResolver {
    fn resolve(&self, description: &str, _dataset: &str) -> CoreResult<VerificationPayload> {
        debug!(description, "Call verification disabled; returning default payload");
        Ok(VerificationPayload::default())
    }

    fn dataset_titles(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// On-chain verifier whose `merkleRoot()` every dataset must match.
#[derive(Clone)]
pub struct RootCheck {
    pub rpc: DynEvmRpc,
    pub verifier: Address,
}

/// Resolver backed by loaded proof datasets.
pub struct DatasetResolver {
    datasets: Vec<ProofDataset>,
    verified_roots: RwLock<HashSet<(String, Address)>>,
}

impl DatasetResolver {
    /// Build from already parsed datasets. Titles must be unique.
    pub fn new(datasets: Vec<ProofDataset>) -> ProofResult<Self> {
        let mut seen: Vec<&ProofDataset> = Vec::with_capacity(datasets.len());
        for dataset in &datasets {
            if let Some(first) = seen.iter().find(|d| d.title == dataset.title) {
                return Err(ProofError::DuplicateTitle {
                    title: dataset.title.clone(),
                    first: first.source_label.clone(),
                    second: dataset.source_label.clone(),
                });
            }
            seen.push(dataset);
        }

        info!(
            datasets = datasets.len(),
            titles = ?datasets.iter().map(|d| d.title.as_str()).collect::<Vec<_>>(),
            "Proof datasets loaded"
        );
        Ok(Self {
            datasets,
            verified_roots: RwLock::new(HashSet::new()),
        })
    }

    /// Load every source, then verify roots when `root_check` is set.
    pub async fn load(
        sources: &[ProofSource],
        fetcher: &ProofFetcher,
        root_check: Option<&RootCheck>,
    ) -> ProofResult<Self> {
        let mut datasets = Vec::new();
        for source in sources {
            datasets.extend(fetcher.load(source).await?);
        }
        let resolver = Self::new(datasets)?;
        if let Some(check) = root_check {
            resolver.verify_roots(check).await?;
        }
        Ok(resolver)
    }

    pub fn dataset(&self, title: &str) -> Option<&ProofDataset> {
        self.datasets.iter().find(|d| d.title == title)
    }

    fn titles(&self) -> Vec<String> {
        self.datasets.iter().map(|d| d.title.clone()).collect()
    }

    /// Compare each dataset's root against the verifier's `merkleRoot()`.
    ///
    /// A successful comparison is remembered per (dataset title, verifier);
    /// every unverified dataset is compared, whatever source it came from.
    pub async fn verify_roots(&self, check: &RootCheck) -> ProofResult<()> {
        let mut onchain: Option<B256> = None;
        for dataset in &self.datasets {
            let key = (dataset.title.clone(), check.verifier);
            if self.verified_roots.read().contains(&key) {
                continue;
            }

            let root = match onchain {
                Some(root) => root,
                None => {
                    let root = read_merkle_root(check).await?;
                    onchain = Some(root);
                    root
                }
            };
            if root != dataset.merkle_root {
                warn!(
                    title = %dataset.title,
                    source = %dataset.source_label,
                    verifier = %check.verifier,
                    "Merkle root mismatch between verifier and proof set"
                );
                return Err(ProofError::RootMismatch {
                    title: dataset.title.clone(),
                    verifier: format!("{:?}", check.verifier),
                    onchain: format!("0x{}", hex::encode(root)),
                    expected: format!("0x{}", hex::encode(dataset.merkle_root)),
                });
            }

            info!(title = %dataset.title, verifier = %check.verifier, "Merkle root verified");
            self.verified_roots.write().insert(key);
        }
        Ok(())
    }

    pub fn is_root_verified(&self, title: &str, verifier: Address) -> bool {
        self.verified_roots
            .read()
            .contains(&(title.to_string(), verifier))
    }

    fn lookup(&self, description: &str, dataset: &str) -> ProofResult<VerificationPayload> {
        let set = self
            .dataset(dataset)
            .ok_or_else(|| ProofError::UnknownDataset {
                title: dataset.to_string(),
                available: self.titles(),
            })?;

        let payload = set
            .payloads
            .get(description)
            .ok_or_else(|| {
                warn!(dataset, available = ?set.descriptions(), "Proof description not found");
                ProofError::UnknownDescription {
                    description: description.to_string(),
                    dataset: dataset.to_string(),
                    available: set.descriptions(),
                }
            })?
            .clone();

        debug!(
            description,
            source = %set.source_label,
            proof_len = payload.proof.len(),
            "Resolved verification payload"
        );
        Ok(payload)
    }
}

impl VerificationResolver for DatasetResolver {
    fn resolve(&self, description: &str, dataset: &str) -> CoreResult<VerificationPayload> {
        Ok(self.lookup(description, dataset)?)
    }

    fn dataset_titles(&self) -> Vec<String> {
        self.titles()
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

async fn read_merkle_root(check: &RootCheck) -> ProofResult<B256> {
    let verifier = format!("{:?}", check.verifier);
    let raw = check
        .rpc
        .call(
            check.verifier,
            Bytes::from(IVerifier::merkleRootCall {}.abi_encode()),
        )
        .await
        .map_err(|e| ProofError::RootRead {
            verifier: verifier.clone(),
            message: e.to_string(),
        })?;
    IVerifier::merkleRootCall::abi_decode_returns(&raw, true)
        .map(|ret| ret._0)
        .map_err(|e| ProofError::RootRead {
            verifier,
            message: e.to_string(),
        })
}

/// How verification payloads are obtained.
#[derive(Debug, Clone, Default)]
pub struct ProofConfig {
    /// Skip proofs entirely and always send the default payload.
    pub disabled: bool,
    pub sources: Vec<ProofSource>,
    pub verifier: Option<Address>,
    /// Chain hosting the verifier.
    pub verifier_chain: Option<ChainKind>,
    pub request_timeout: Duration,
}

/// Choose and build the resolver for `config`.
///
/// Disabled verification, or no sources at all, yields `DisabledResolver`.
/// `verifier_rpc` is used only when a verifier address is configured.
pub async fn build_resolver(
    config: &ProofConfig,
    verifier_rpc: Option<DynEvmRpc>,
) -> CoreResult<DynResolver> {
    if config.disabled || config.sources.is_empty() {
        if !config.disabled {
            info!("No proof sources configured; using default verification payloads");
        }
        return Ok(Arc::new(DisabledResolver));
    }

    let fetcher = ProofFetcher::new(config.request_timeout)?;
    let root_check = match (config.verifier, verifier_rpc) {
        (Some(verifier), Some(rpc)) => Some(RootCheck { rpc, verifier }),
        (Some(verifier), None) => {
            warn!(verifier = %verifier, "Verifier configured without an RPC; root check skipped");
            None
        }
        _ => None,
    };

    let resolver = DatasetResolver::load(&config.sources, &fetcher, root_check.as_ref()).await?;
    Ok(Arc::new(resolver))
}

/// Parse a verifier network label (`hyper`, `hyperliquid`, `hl`, `mainnet`,
/// `ethereum`, `eth`).
pub fn chain_from_label(label: &str) -> Option<ChainKind> {
    match label.trim().to_lowercase().as_str() {
        "hyper" | "hyperliquid" | "hl" | "hyperevm" => Some(ChainKind::HyperEvm),
        "mainnet" | "ethereum" | "eth" => Some(ChainKind::Mainnet),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::dataset_json;
    use crate::dataset::INLINE_LABEL;
    use crate::source::tests::{ok_response, serve};
    use alloy::sol_types::SolValue;
    use hlvault_chain::MockEvmRpc;
    use serde_json::json;

    fn dataset(title: &str, root: u8) -> ProofDataset {
        ProofDataset::from_json(&dataset_json(title, root), INLINE_LABEL).unwrap()
    }

    #[test]
    fn test_duplicate_title_fails_construction() {
        let err = DatasetResolver::new(vec![dataset("HyperEVM", 1), dataset("HyperEVM", 2)])
            .err()
            .unwrap();
        assert!(matches!(err, ProofError::DuplicateTitle { ref title, .. } if title == "HyperEVM"));

        let core: hlvault_core::CoreError = err.into();
        assert!(core.is_validation());
        assert_eq!(core.field(), Some("title"));
    }

    #[tokio::test]
    async fn test_duplicate_across_sources() {
        let fetcher = ProofFetcher::new(Duration::from_secs(1)).unwrap();
        let sources = vec![
            ProofSource::Inline(dataset_json("Mainnet", 1)),
            ProofSource::Inline(json!([dataset_json("HyperEVM", 2), dataset_json("Mainnet", 3)])),
        ];
        let err = DatasetResolver::load(&sources, &fetcher, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProofError::DuplicateTitle { .. }));
    }

    #[test]
    fn test_resolve_and_diagnostics() {
        let resolver = DatasetResolver::new(vec![dataset("HyperEVM", 1)]).unwrap();
        let payload = resolver
            .resolve("USDC.approve(TokenMessenger, anyInt)", "HyperEVM")
            .unwrap();
        assert_eq!(payload.verification_type, 2);

        let err = resolver.resolve("USDC.approve(TokenMessenger, anyInt)", "Nope").unwrap_err();
        assert_eq!(err.field(), Some("dataset"));
        assert!(err.to_string().contains("HyperEVM"));

        let err = resolver.resolve("transfer(anyInt)", "HyperEVM").unwrap_err();
        assert_eq!(err.field(), Some("description"));
        assert!(err.to_string().contains("TokenMessenger.depositForBurn(anyInt)"));
    }

    #[test]
    fn test_disabled_returns_default() {
        let resolver = DisabledResolver;
        assert!(resolver.resolve("anything", "any").unwrap().is_default());
        assert!(!resolver.is_enabled());
        assert_eq!(resolver.dataset_for_chain(ChainKind::Mainnet), DEFAULT_DATASET);
    }

    #[test]
    fn test_dataset_for_chain() {
        let resolver = DatasetResolver::new(vec![
            dataset("Strategy on HyperEVM", 1),
            dataset("Ethereum bridge", 2),
        ])
        .unwrap();
        assert_eq!(resolver.dataset_for_chain(ChainKind::HyperEvm), "Strategy on HyperEVM");
        assert_eq!(resolver.dataset_for_chain(ChainKind::Mainnet), "Ethereum bridge");

        let single = DatasetResolver::new(vec![dataset("vault", 1)]).unwrap();
        assert_eq!(single.dataset_for_chain(ChainKind::Mainnet), "vault");
    }

    #[tokio::test]
    async fn test_root_verified_once() {
        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let verifier = Address::repeat_byte(0x99);
        rpc.on_call(verifier, Vec::new(), B256::repeat_byte(1).abi_encode());
        let check = RootCheck {
            rpc: rpc.clone(),
            verifier,
        };

        let resolver = DatasetResolver::new(vec![dataset("HyperEVM", 1)]).unwrap();
        resolver.verify_roots(&check).await.unwrap();
        resolver.verify_roots(&check).await.unwrap();
        assert_eq!(rpc.call_count_to(verifier), 1);
        assert!(resolver.is_root_verified("HyperEVM", verifier));
    }

    #[tokio::test]
    async fn test_every_dataset_from_one_source_is_compared() {
        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let verifier = Address::repeat_byte(0x99);
        rpc.on_call(verifier, Vec::new(), B256::repeat_byte(1).abi_encode());
        let check = RootCheck {
            rpc: rpc.clone(),
            verifier,
        };

        let label = "https://proofs.example/sets.json";
        let resolver = DatasetResolver::new(vec![
            ProofDataset::from_json(&dataset_json("HyperEVM", 1), label).unwrap(),
            ProofDataset::from_json(&dataset_json("Mainnet", 7), label).unwrap(),
        ])
        .unwrap();

        let err = resolver.verify_roots(&check).await.unwrap_err();
        assert!(matches!(err, ProofError::RootMismatch { ref title, .. } if title == "Mainnet"));
        assert!(resolver.is_root_verified("HyperEVM", verifier));
        assert!(!resolver.is_root_verified("Mainnet", verifier));

        // still rejected on a second pass
        assert!(resolver.verify_roots(&check).await.is_err());
        assert!(!resolver.is_root_verified("Mainnet", verifier));
    }

    #[tokio::test]
    async fn test_matching_datasets_share_one_root_read() {
        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let verifier = Address::repeat_byte(0x99);
        rpc.on_call(verifier, Vec::new(), B256::repeat_byte(1).abi_encode());
        let check = RootCheck {
            rpc: rpc.clone(),
            verifier,
        };

        let resolver =
            DatasetResolver::new(vec![dataset("HyperEVM", 1), dataset("Mainnet", 1)]).unwrap();
        resolver.verify_roots(&check).await.unwrap();
        assert!(resolver.is_root_verified("HyperEVM", verifier));
        assert!(resolver.is_root_verified("Mainnet", verifier));
        assert!(!resolver.is_root_verified("HyperEVM", Address::repeat_byte(0x98)));
        assert_eq!(rpc.call_count_to(verifier), 1);
    }

    #[tokio::test]
    async fn test_url_source_with_forged_root_fails_load() {
        let body = json!([dataset_json("HyperEVM", 1), dataset_json("Mainnet", 7)]).to_string();
        let (url, _hits) = serve(ok_response(&body)).await;

        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let verifier = Address::repeat_byte(0x99);
        rpc.on_call(verifier, Vec::new(), B256::repeat_byte(1).abi_encode());
        let check = RootCheck {
            rpc: rpc.clone(),
            verifier,
        };

        let fetcher = ProofFetcher::new(Duration::from_secs(5)).unwrap();
        let err = DatasetResolver::load(&[ProofSource::Url(url)], &fetcher, Some(&check))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProofError::RootMismatch { ref title, .. } if title == "Mainnet"));
    }

    #[tokio::test]
    async fn test_root_mismatch_is_fatal() {
        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let verifier = Address::repeat_byte(0x99);
        rpc.on_call(verifier, Vec::new(), B256::repeat_byte(7).abi_encode());
        let check = RootCheck {
            rpc: rpc.clone(),
            verifier,
        };

        let fetcher = ProofFetcher::new(Duration::from_secs(1)).unwrap();
        let err = DatasetResolver::load(
            &[ProofSource::Inline(dataset_json("HyperEVM", 1))],
            &fetcher,
            Some(&check),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ProofError::RootMismatch { .. }));

        // not remembered as verified
        let resolver = DatasetResolver::new(vec![dataset("HyperEVM", 1)]).unwrap();
        assert!(resolver.verify_roots(&check).await.is_err());
        assert!(!resolver.is_root_verified("HyperEVM", verifier));
    }

    #[tokio::test]
    async fn test_build_resolver_selection() {
        let disabled = build_resolver(
            &ProofConfig {
                disabled: true,
                sources: vec![ProofSource::Inline(dataset_json("HyperEVM", 1))],
                ..ProofConfig::default()
            },
            None,
        )
        .await
        .unwrap();
        assert!(!disabled.is_enabled());

        let enabled = build_resolver(
            &ProofConfig {
                sources: vec![ProofSource::Inline(dataset_json("HyperEVM", 1))],
                request_timeout: Duration::from_secs(1),
                ..ProofConfig::default()
            },
            None,
        )
        .await
        .unwrap();
        assert!(enabled.is_enabled());
        assert_eq!(enabled.dataset_titles(), vec!["HyperEVM".to_string()]);
    }

    #[test]
    fn test_chain_from_label() {
        assert_eq!(chain_from_label("HL"), Some(ChainKind::HyperEvm));
        assert_eq!(chain_from_label(" eth "), Some(ChainKind::Mainnet));
        assert_eq!(chain_from_label("solana"), None);
    }
}
