//! Registry error types.

use hlvault_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected info response: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Convert into the shared network error kind, naming the endpoint.
    pub fn into_network(self, endpoint: &str) -> CoreError {
        CoreError::network(self.to_string(), endpoint)
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
