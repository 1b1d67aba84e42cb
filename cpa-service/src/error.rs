//! Error types for the field management service

use std::path::PathBuf;

use cpa_fields::FieldsError;
use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Coarse error category, used by the transport to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidField,
    NotFound,
    Forbidden,
    FeatureDisabled,
    Internal,
}

/// Errors that can occur in field management
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The field definition failed validation
    #[error(transparent)]
    Invalid(#[from] FieldsError),

    /// Deleted fields cannot be patched
    #[error("field has been deleted: {id}")]
    FieldDeleted { id: String },

    /// Creating another field would exceed the configured limit
    #[error("field limit reached: at most {limit} active fields are allowed")]
    FieldLimitReached { limit: usize },

    /// No record with this ID
    #[error("field not found: {id}")]
    NotFound { id: String },

    /// A record with this ID already exists
    #[error("duplicate field ID: {id}")]
    DuplicateId { id: String },

    /// Actor lacks the capability for this action
    #[error("{actor} is not allowed to {action} fields")]
    Forbidden { actor: String, action: String },

    /// The custom profile attributes feature flag is off
    #[error("custom profile attributes are disabled")]
    FeatureDisabled,

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration file has an extension we cannot read
    #[error("unsupported configuration file format: {path}")]
    UnsupportedConfigFormat { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl From<figment::Error> for ServiceError {
    fn from(error: figment::Error) -> Self {
        ServiceError::Config(Box::new(error))
    }
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create a forbidden error
    pub fn forbidden(actor: impl ToString, action: impl Into<String>) -> Self {
        Self::Forbidden {
            actor: actor.to_string(),
            action: action.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) | Self::FieldDeleted { .. } | Self::FieldLimitReached { .. } => {
                ErrorKind::InvalidField
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::FeatureDisabled => ErrorKind::FeatureDisabled,
            Self::DuplicateId { .. }
            | Self::Config(_)
            | Self::UnsupportedConfigFormat { .. }
            | Self::Io(_)
            | Self::Yaml(_) => ErrorKind::Internal,
        }
    }
}
