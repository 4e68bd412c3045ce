//! Chain access error types.

use hlvault_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("HTTP request for {method} failed: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP status {status}")]
    Status { method: String, status: u16 },

    #[error("RPC error for {method}: {message} (code {code})")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Invalid response for {method}: {message}")]
    InvalidResponse { method: String, message: String },

    #[error("ABI decode failed for {what}: {message}")]
    Decode { what: String, message: String },
}

impl ChainError {
    pub fn invalid_response(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn decode(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Transient failures worth retrying for idempotent reads.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Rpc { code, .. } => *code == -32005 || *code == 429,
            _ => false,
        }
    }

    /// Convert into the shared network error kind, naming the endpoint.
    pub fn into_network(self, endpoint: &str) -> CoreError {
        CoreError::network(self.to_string(), endpoint)
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
