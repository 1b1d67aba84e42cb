//! Error types for field validation

use thiserror::Error;

/// Result type for field operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Errors raised while decoding or validating a field definition
#[derive(Debug, Error)]
pub enum FieldsError {
    /// A field or option failed a validation check. The display string is the
    /// reason alone so it can be surfaced verbatim.
    #[error("{reason}")]
    InvalidField { reason: String },

    /// A select option failed validation
    #[error("invalid option at index {index}: {source}")]
    InvalidOption {
        index: usize,
        #[source]
        source: Box<FieldsError>,
    },
}

impl FieldsError {
    /// Create an invalid field error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidField {
            reason: reason.into(),
        }
    }

    /// Wrap an option's error with its position in the options list
    pub fn invalid_option(index: usize, source: FieldsError) -> Self {
        Self::InvalidOption {
            index,
            source: Box::new(source),
        }
    }

    /// The reason of the innermost check that failed.
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidField { reason } => reason,
            Self::InvalidOption { source, .. } => source.reason(),
        }
    }
}
