//! Merkle proof datasets and verification payloads.
//!
//! Proof sets are loaded once at construction (inline JSON or https URLs),
//! validated eagerly, and served by description and dataset title.

pub mod dataset;
pub mod error;
pub mod resolver;
pub mod source;

pub use dataset::ProofDataset;
pub use error::{ProofError, ProofResult};
pub use resolver::{
    build_resolver, chain_from_label, DatasetResolver, DisabledResolver, DynResolver, ProofConfig,
    RootCheck, VerificationResolver, DEFAULT_DATASET,
};
pub use source::{validate_source_url, ProofFetcher, ProofSource};
