//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Toxicity must be a probability
    #[error("Invalid toxicity {0}: must be within [0, 1]")]
    InvalidToxicity(f64),

    /// A name or identifier was empty
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_toxicity_mentions_value() {
        let err = DomainError::InvalidToxicity(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn empty_identifier_names_field() {
        let err = DomainError::EmptyIdentifier("proxy name");
        assert_eq!(err.to_string(), "proxy name must not be empty");
    }

    #[test]
    fn validation_helper_builds_variant() {
        let err = DomainError::validation("bad");
        assert_eq!(err, DomainError::ValidationError("bad".to_string()));
    }
}
