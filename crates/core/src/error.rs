//! Error taxonomy shared by every store implementation.

use thiserror::Error;

/// Bit-preservation domain error.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition on an argument failed (empty identifier, bad format).
    #[error("argument not valid: {0}")]
    ArgumentNotValid(String),

    /// The filename, replica or state combination does not exist.
    #[error("unknown id: {0}")]
    UnknownId(String),

    /// The operation would violate a model invariant.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The backing store could not be reached within the retry budget.
    #[error("store unavailable after {attempts} attempts: {message}")]
    StoreUnavailable { attempts: u32, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure that is not part of the taxonomy above.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_message() {
        let err = Error::StoreUnavailable {
            attempts: 5,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store unavailable after 5 attempts: connection refused"
        );
    }
}
