//! Metadata store error types.

use bitpres_core::Error as CoreError;
use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("argument not valid: {0}")]
    ArgumentNotValid(String),

    #[error("unknown id: {0}")]
    UnknownId(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Connection acquisition failed on every attempt.
    #[error("store unavailable after {attempts} attempts: {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

impl From<CoreError> for MetadataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ArgumentNotValid(msg) => Self::ArgumentNotValid(msg),
            CoreError::UnknownId(msg) => Self::UnknownId(msg),
            CoreError::IllegalState(msg) => Self::IllegalState(msg),
            CoreError::Config(msg) => Self::Config(msg),
            CoreError::Io(err) => Self::Io(err),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MetadataError> for CoreError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::ArgumentNotValid(msg) => Self::ArgumentNotValid(msg),
            MetadataError::UnknownId(msg) => Self::UnknownId(msg),
            MetadataError::IllegalState(msg) => Self::IllegalState(msg),
            MetadataError::StoreUnavailable { attempts, source } => Self::StoreUnavailable {
                attempts,
                message: source.to_string(),
            },
            MetadataError::Config(msg) => Self::Config(msg),
            MetadataError::Io(err) => Self::Io(err),
            other => Self::Backend(other.to_string()),
        }
    }
}
