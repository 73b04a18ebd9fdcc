//! Registry error types.

use bitpres_core::Error as CoreError;
use thiserror::Error;

/// File registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("argument not valid: {0}")]
    ArgumentNotValid(String),

    #[error("unknown id: {0}")]
    UnknownId(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A persisted line could not be parsed.
    #[error("corrupt entry: {0}")]
    Corrupt(String),

    #[error("unsupported registry version '{0}'")]
    UnsupportedVersion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

impl From<CoreError> for RegistryError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ArgumentNotValid(msg) => Self::ArgumentNotValid(msg),
            CoreError::UnknownId(msg) => Self::UnknownId(msg),
            CoreError::IllegalState(msg) => Self::IllegalState(msg),
            CoreError::Io(err) => Self::Io(err),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ArgumentNotValid(msg) => Self::ArgumentNotValid(msg),
            RegistryError::UnknownId(msg) => Self::UnknownId(msg),
            RegistryError::IllegalState(msg) => Self::IllegalState(msg),
            RegistryError::Io(err) => Self::Io(err),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_id_maps_to_core() {
        let err: CoreError = RegistryError::UnknownId("file 'x'".to_string()).into();
        assert!(matches!(err, CoreError::UnknownId(_)));
    }

    #[test]
    fn test_version_error_is_backend_failure() {
        let err: CoreError = RegistryError::UnsupportedVersion("9.9".to_string()).into();
        assert!(matches!(err, CoreError::Backend(msg) if msg.contains("9.9")));
    }
}
