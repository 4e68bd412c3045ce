//! Attestation service errors.

use hlvault_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Unexpected {field} format: {message}")]
    UnexpectedResponse { field: String, message: String },
}

impl BridgeError {
    /// Polling keeps going through these.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::UnexpectedResponse { .. } => false,
        }
    }
}

impl From<BridgeError> for CoreError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err {
            BridgeError::Http { url, .. } | BridgeError::Status { url, .. } => {
                CoreError::network(message, url)
            }
            BridgeError::UnexpectedResponse { field, .. } => {
                CoreError::validation(message, field, "")
            }
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
