//! Error types for sqlhelper

use std::sync::Arc;

use thiserror::Error;

/// Error reported by the underlying database driver
///
/// `Display` is the driver's native message, unchanged, so callers see
/// exactly what the database reported.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn other(message: impl Into<String>) -> Self {
        DriverError::Other(message.into())
    }
}

/// Which step of an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PoolCreation,
    PoolTeardown,
    ConnectionAcquisition,
    Execution,
    Release,
}

/// Error returned by pool lifecycle and statement operations
#[derive(Error, Debug)]
pub enum OperationError {
    /// Shared by every caller that waited on the same pool creation
    #[error("{0}")]
    PoolCreation(Arc<DriverError>),

    #[error("{0}")]
    PoolTeardown(#[source] DriverError),

    #[error("{0}")]
    ConnectionAcquisition(#[source] DriverError),

    /// Statement failure. A release failure on the same connection is kept in
    /// `suppressed` and never replaces `source`.
    #[error("{source}")]
    Execution {
        #[source]
        source: DriverError,
        suppressed: Option<DriverError>,
    },

    /// Only produced for diagnostics; `run` logs it and never returns it.
    #[error("{0}")]
    Release(#[source] DriverError),
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::PoolCreation(_) => ErrorKind::PoolCreation,
            OperationError::PoolTeardown(_) => ErrorKind::PoolTeardown,
            OperationError::ConnectionAcquisition(_) => ErrorKind::ConnectionAcquisition,
            OperationError::Execution { .. } => ErrorKind::Execution,
            OperationError::Release(_) => ErrorKind::Release,
        }
    }

    /// The release failure hidden behind an execution failure, if any
    pub fn suppressed(&self) -> Option<&DriverError> {
        match self {
            OperationError::Execution { suppressed, .. } => suppressed.as_ref(),
            _ => None,
        }
    }
}

/// Error raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read .env file: {0}")]
    Env(#[from] dotenvy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for statement and pool operations
pub type Result<T> = std::result::Result<T, OperationError>;
