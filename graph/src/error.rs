//! Association error types.

use tether_core::ObjectId;
use tether_registry::RelKind;
use thiserror::Error;

/// Result type for association operations.
pub type AssocResult<T> = Result<T, AssocError>;

/// Errors surfaced to the caller of a relationship operation.
///
/// A failed operation leaves every container as it was before the call.
#[derive(Debug, Error)]
pub enum AssocError {
    #[error("{endpoint} expects {expected}, got {found}")]
    TypeViolation {
        endpoint: String,
        expected: String,
        found: String,
    },

    #[error("{endpoint} cannot hold null")]
    NullViolation { endpoint: String },

    #[error("Object {object} is already in {endpoint}")]
    Duplicate { endpoint: String, object: ObjectId },

    #[error("Object {object} is not in {endpoint}")]
    NotMember { endpoint: String, object: ObjectId },

    #[error("Endpoint {0} is read-only")]
    ReadOnly(String),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Class {class} has no endpoint {name}")]
    UnknownEndpoint { class: String, name: String },

    #[error("Endpoint {endpoint} is {actual}, not {expected}")]
    WrongKind {
        endpoint: String,
        expected: RelKind,
        actual: RelKind,
    },

    #[error("Endpoint {endpoint} is not defined on class {class}")]
    EndpointNotOnClass { endpoint: String, class: String },

    #[error("Index {index} out of range for {endpoint} of length {len}")]
    IndexOutOfRange {
        endpoint: String,
        index: usize,
        len: usize,
    },

    #[error("Path step {from} does not lead to the owner of {to}")]
    PathMismatch { from: String, to: String },
}

impl AssocError {
    pub fn type_violation(
        endpoint: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeViolation {
            endpoint: endpoint.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn null_violation(endpoint: impl Into<String>) -> Self {
        Self::NullViolation {
            endpoint: endpoint.into(),
        }
    }

    pub fn duplicate(endpoint: impl Into<String>, object: ObjectId) -> Self {
        Self::Duplicate {
            endpoint: endpoint.into(),
            object,
        }
    }

    pub fn not_member(endpoint: impl Into<String>, object: ObjectId) -> Self {
        Self::NotMember {
            endpoint: endpoint.into(),
            object,
        }
    }

    pub fn index_out_of_range(endpoint: impl Into<String>, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange {
            endpoint: endpoint.into(),
            index,
            len,
        }
    }
}
