//! Proof loading and resolution errors.

use hlvault_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("Invalid proof dataset field `{field}`: {message}")]
    InvalidDataset { field: String, message: String },

    #[error("Duplicate proof dataset title '{title}' ({first} and {second})")]
    DuplicateTitle {
        title: String,
        first: String,
        second: String,
    },

    #[error("Proof source must use https: {url}")]
    InsecureSource { url: String },

    #[error("Proof source {url} responded with redirect {status} to {location}")]
    Redirect {
        url: String,
        status: u16,
        location: String,
    },

    #[error("Failed to fetch proof set from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Unknown proof dataset '{title}' (available: {available:?})")]
    UnknownDataset {
        title: String,
        available: Vec<String>,
    },

    #[error("No proof for '{description}' in dataset '{dataset}' (available: {available:?})")]
    UnknownDescription {
        description: String,
        dataset: String,
        available: Vec<String>,
    },

    #[error("Failed to read merkle root from verifier {verifier}: {message}")]
    RootRead { verifier: String, message: String },

    #[error("Merkle root mismatch for '{title}': verifier {verifier} has {onchain}, dataset declares {expected}")]
    RootMismatch {
        title: String,
        verifier: String,
        onchain: String,
        expected: String,
    },
}

impl ProofError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ProofError> for CoreError {
    fn from(err: ProofError) -> Self {
        let message = err.to_string();
        match err {
            ProofError::InvalidDataset { field, .. } => CoreError::validation(message, field, ""),
            ProofError::DuplicateTitle { title, .. } => {
                CoreError::validation(message, "title", title)
            }
            ProofError::InsecureSource { url } | ProofError::Redirect { url, .. } => {
                CoreError::validation(message, "url", url)
            }
            ProofError::Fetch { url, .. } => CoreError::network(message, url),
            ProofError::UnknownDataset { title, .. } => {
                CoreError::validation(message, "dataset", title)
            }
            ProofError::UnknownDescription { description, .. } => {
                CoreError::validation(message, "description", description)
            }
            ProofError::RootRead { verifier, .. } => CoreError::network(message, verifier),
            ProofError::RootMismatch { onchain, .. } => {
                CoreError::validation(message, "merkle_root", onchain)
            }
        }
    }
}

pub type ProofResult<T> = Result<T, ProofError>;
