use alloy_primitives::I256;
use thiserror::Error;

/// Errors raised while turning user input into contract field values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Value falls outside `[0, 2^254 - 1]`
    #[error("{field} field value {value} is out of range")]
    OutOfRange { field: &'static str, value: I256 },

    /// Numeric input without a leading integer
    #[error("'{input}' is not an integer")]
    NotAnInteger { input: String },

    /// Integer input too large to even represent as a candidate field value
    #[error("integer '{input}' exceeds the field domain")]
    Overflow { input: String },

    /// Farmer hash that is not 32 bytes of hex
    #[error("Malformed farmer hash '{input}': {reason}")]
    MalformedHash { input: String, reason: String },
}

impl FieldError {
    /// Get error code for logging
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "FIELD_OUT_OF_RANGE",
            Self::NotAnInteger { .. } => "FIELD_NOT_AN_INTEGER",
            Self::Overflow { .. } => "FIELD_OVERFLOW",
            Self::MalformedHash { .. } => "MALFORMED_HASH",
        }
    }
}
