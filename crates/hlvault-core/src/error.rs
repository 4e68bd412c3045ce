//! Error types for hlvault-core.
//!
//! Three kinds cross every crate boundary:
//! - `Validation`: bad caller input, never retried, always names the field.
//! - `Network`: RPC/HTTP failure, contract revert, receipt timeout.
//! - `Timeout`: the attestation poll ran out; the burn already happened.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed for `{field}`: {message} (value={value})")]
    Validation {
        message: String,
        field: String,
        value: String,
    },

    #[error("Value out of range for `{field}`: {message} (value={value})")]
    RangeExceeded {
        message: String,
        field: String,
        value: String,
    },

    #[error("Network error at {endpoint}: {message}")]
    Network {
        message: String,
        endpoint: String,
        details: Option<String>,
    },

    #[error("Timed out: {message}")]
    Timeout {
        message: String,
        tx_hash: Option<String>,
    },

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

impl CoreError {
    pub fn validation(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn range_exceeded(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::RangeExceeded {
            message: message.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn network(message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            endpoint: endpoint.into(),
            details: None,
        }
    }

    pub fn timeout(message: impl Into<String>, tx_hash: Option<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            tx_hash,
        }
    }

    /// Attach free-form diagnostic details to a network error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_details(self, details: impl Into<String>) -> Self {
        match self {
            Self::Network {
                message, endpoint, ..
            } => Self::Network {
                message,
                endpoint,
                details: Some(details.into()),
            },
            other => other,
        }
    }

    /// True for caller-input errors (including range errors).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::RangeExceeded { .. } | Self::DecimalParse(_)
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Offending field for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::RangeExceeded { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Offending value (stringified) for validation errors.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Validation { value, .. } | Self::RangeExceeded { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Short machine-readable kind label, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::DecimalParse(_) => "validation",
            Self::RangeExceeded { .. } => "range",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_carries_field_and_value() {
        let err = CoreError::validation("Bridge amount must be positive", "amount", -1);
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(err.value(), Some("-1"));
        assert!(err.to_string().contains("Bridge amount must be positive"));
    }

    #[test]
    fn test_with_details_only_touches_network() {
        let err = CoreError::network("boom", "https://rpc").with_details("args=[1]");
        match err {
            CoreError::Network { details, .. } => assert_eq!(details.as_deref(), Some("args=[1]")),
            other => panic!("unexpected {other:?}"),
        }

        let err = CoreError::timeout("slow", Some("0xabc".to_string())).with_details("x");
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "timeout");
    }
}
