//! Error types for the calbridge ecosystem.

use thiserror::Error;

/// Whether a backend failure is worth retrying on a later pass.
///
/// Transient failures (network, 5xx) are retried at the next scheduled
/// pass, never inline. Permanent failures (4xx other than not-found) are
/// logged and the affected event is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Transient,
    Permanent,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendErrorKind::Transient => write!(f, "transient"),
            BackendErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors that can occur in calbridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error ({kind}): {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    pub fn transient(message: impl Into<String>) -> Self {
        BridgeError::Backend {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        BridgeError::Backend {
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }
}

/// Result type alias for calbridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
