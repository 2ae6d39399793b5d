//! Crate-level error type.

use crate::client::SubmitError;
use crate::config::ConfigError;
use crate::token::TokenError;

/// Any failure that means the log was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The log body supplied by the caller could not be read
    #[error("Invalid log body: {0}")]
    Input(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_transparent() {
        let inner = ConfigError::Missing("appId");
        let expected = inner.to_string();
        let error: Error = inner.into();
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_input_error_display() {
        let error = Error::Input("expected value at line 1".to_string());
        assert_eq!(error.to_string(), "Invalid log body: expected value at line 1");
    }
}
