//! Unified error system for the onramp engine
//!
//! One error enum covers the whole engine. Variants follow the failure
//! taxonomy the components are written against: validation errors are
//! rejected synchronously and never partially applied, staleness and
//! conflict errors leave state retryable, and resource exhaustion surfaces
//! to the operator rather than being retried.

use serde::{Deserialize, Serialize};

/// Unified error type for all engine operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: bad address, unsupported asset, missing key
    #[error("Validation: {message}")]
    Validation {
        /// What failed validation
        message: String,
    },

    /// Channel, address, or plan not found
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// Concurrent operation lost the race (second prepare, second ACT consumer)
    #[error("Conflict: {message}")]
    Conflict {
        /// What conflicted
        message: String,
    },

    /// Observed state diverged from a plan snapshot
    #[error("Stale: {message}")]
    Stale {
        /// What went stale
        message: String,
    },

    /// No ACT and no delegation capacity left
    #[error("Resource exhausted: {message}")]
    ResourceExhausted {
        /// Which resource ran out
        message: String,
    },

    /// Persistent store operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// What the store reported
        message: String,
    },

    /// External collaborator (chain client, provisioner, monitor) failed
    #[error("External error: {message}")]
    External {
        /// What the collaborator reported
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },
}

impl EngineError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a staleness error
    pub fn stale(message: impl Into<String>) -> Self {
        Self::Stale {
            message: message.into(),
        }
    }

    /// Create a resource exhaustion error
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an external collaborator error
    pub fn external(message: impl Into<String>) -> Self {
        Self::External {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a caller may safely retry the same call without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Stale { .. } | Self::Conflict { .. } | Self::Storage { .. }
        )
    }
}

/// Standard Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = EngineError::validation("missing memo");
        assert!(matches!(err, EngineError::Validation { .. }));
        assert_eq!(err.to_string(), "Validation: missing memo");
    }

    #[test]
    fn test_retryability() {
        assert!(EngineError::stale("balance moved").is_retryable());
        assert!(EngineError::conflict("plan in flight").is_retryable());
        assert!(!EngineError::resource_exhausted("no ACT").is_retryable());
        assert!(!EngineError::validation("bad address").is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing row");
        let err = EngineError::from(io_err);
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
