//! Error types for Harmony operations

use crate::{Query, RepositoryMethod};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Data layer errors raised by data sources and repositories.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Object not valid: {reason}")]
    NotValid { reason: String },

    #[error("Query not supported: {query}")]
    QueryNotSupported { query: String },

    #[error("Illegal argument: {reason}")]
    IllegalArgument { reason: String },

    #[error("Data serialization failed: {reason}")]
    DataSerialization { reason: String },

    #[error("Not implemented")]
    NotImplemented,
}

/// Errors raised when a repository receives an operation it cannot honour.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("Undefined operation {operation} for method {method} on {repository}")]
    NotSupported {
        operation: String,
        method: RepositoryMethod,
        repository: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Opaque error coming from a transport or backend (network, database, ...).
///
/// The original error is kept behind an `Arc` so it can be cloned into every
/// observer of a failed future and still be downcast by the caller.
#[derive(Clone)]
pub struct TransportError(Arc<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Try to view the wrapped error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportError").field(&self.0.to_string()).finish()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl PartialEq for TransportError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Master error type for all Harmony errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HarmonyError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed: {message}")]
    Failed { message: String },
}

impl HarmonyError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Data(DataError::NotFound { what: what.into() })
    }

    pub fn not_valid(reason: impl Into<String>) -> Self {
        Self::Data(DataError::NotValid {
            reason: reason.into(),
        })
    }

    pub fn query_not_supported(query: &Query) -> Self {
        Self::Data(DataError::QueryNotSupported {
            query: query.to_string(),
        })
    }

    pub fn illegal_argument(reason: impl Into<String>) -> Self {
        Self::Data(DataError::IllegalArgument {
            reason: reason.into(),
        })
    }

    pub fn not_implemented() -> Self {
        Self::Data(DataError::NotImplemented)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(TransportError::new(error))
    }

    /// Returns true for `DataError::NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Data(DataError::NotFound { .. }))
    }

    /// Returns true for `DataError::NotValid`.
    pub fn is_not_valid(&self) -> bool {
        matches!(self, Self::Data(DataError::NotValid { .. }))
    }

    /// Returns true when the error originated in a transport or backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for HarmonyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Data(DataError::DataSerialization {
            reason: e.to_string(),
        })
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse {
            reason: e.to_string(),
        }
    }
}

/// Result type alias for Harmony operations.
pub type HarmonyResult<T> = Result<T, HarmonyError>;

// =============================================================================
// TESTS
// =============================================================================
