//! Argument precondition checks.

use crate::error::{Error, Result};

/// Reject empty or whitespace-only identifiers.
pub fn not_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::ArgumentNotValid(format!(
            "{what} must be a non-empty string"
        )));
    }
    Ok(value)
}

/// Reject identifiers that would break the whitespace-delimited legacy format.
pub fn no_whitespace<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    not_empty(value, what)?;
    if value.chars().any(char::is_whitespace) {
        return Err(Error::ArgumentNotValid(format!(
            "{what} must not contain whitespace: '{value}'"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty() {
        assert!(not_empty("file.arc", "filename").is_ok());
        assert!(matches!(
            not_empty("", "filename"),
            Err(Error::ArgumentNotValid(_))
        ));
        assert!(matches!(
            not_empty("   ", "filename"),
            Err(Error::ArgumentNotValid(_))
        ));
    }

    #[test]
    fn test_no_whitespace() {
        assert!(no_whitespace("abc", "checksum").is_ok());
        let err = no_whitespace("a b", "checksum").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }
}
