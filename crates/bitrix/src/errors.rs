use crmbridge_core::{DomainError, EntityId};
use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: EntityId },
    #[error("malformed response from `{method}`: {reason}")]
    MalformedResponse { method: String, reason: String },
    #[error("response from `{method}` is missing `{key}`")]
    MissingKey { method: String, key: &'static str },
    #[error("response from `{method}` has the wrong type (expected {expected})")]
    WrongType { method: String, expected: &'static str },
    #[error("invalid value from `{method}`: {detail}")]
    InvalidValue { method: String, detail: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Log level an absorbed error is reported at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Warn,
    Error,
}

impl RepositoryError {
    /// Stable classifier used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Client(ClientError::Connection(_)) => "connection",
            Self::Client(ClientError::Timeout(_)) => "timeout",
            Self::Client(ClientError::Api { .. }) | Self::Client(ClientError::Status { .. }) => {
                "runtime"
            }
            Self::Client(ClientError::Decode(_)) | Self::Client(ClientError::Encode(_)) => {
                "invalid_value"
            }
            Self::NotFound { .. } => "not_found",
            Self::MalformedResponse { .. } | Self::InvalidValue { .. } => "invalid_value",
            Self::MissingKey { .. } => "missing_key",
            Self::WrongType { .. } => "wrong_type",
            Self::Domain(DomainError::UnknownAttribute { .. }) => "attribute_access",
            Self::Domain(_) => "unclassified",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::NotFound { .. } => Severity::Debug,
            Self::MalformedResponse { .. }
            | Self::MissingKey { .. }
            | Self::WrongType { .. }
            | Self::InvalidValue { .. } => Severity::Warn,
            Self::Client(_) | Self::Domain(_) => Severity::Error,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),
    #[error("repository registered for `{entity_type}` is not a `{expected}`")]
    TypeMismatch { entity_type: String, expected: &'static str },
}
