//! Error taxonomy shared by the resolver's callers and the mutation gateway.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No identity, or the presented credential is invalid or expired
    #[error("Authentication required")]
    Authentication,

    /// Valid identity without rights for this record or field
    #[error("Not permitted: {reason}")]
    Authorization { reason: String },

    /// Malformed payload: missing required field or invalid value
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced owner or assignee does not exist
    #[error("{field} references unknown record {id}")]
    Reference { field: String, id: String },
}

impl AccessError {
    pub fn authorization(reason: impl Into<String>) -> Self {
        Self::Authorization {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn reference(field: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Reference {
            field: field.into(),
            id: id.into(),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
