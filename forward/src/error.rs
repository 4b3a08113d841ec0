//! Forward-reference error types.

use crate::{CallId, RefId};
use thiserror::Error;

/// Result type for forward operations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Errors that can occur while declaring, binding or inspecting forward references.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Illegal forward reference name: {name:?}")]
    IllegalName { name: String },

    #[error("Name {name} is already defined in this context")]
    DuplicateName { name: String },

    #[error("Name {name} is not declared in this context")]
    UndefinedName { name: String },

    #[error("Unknown forward reference: {0}")]
    UnknownReference(RefId),

    #[error("Unknown forward call: {0}")]
    UnknownCall(CallId),

    #[error("Forward reference {path} is already bound")]
    AlreadyBound { path: String },

    #[error("Value bound to {path} has no member {member}")]
    MissingMember { path: String, member: String },

    #[error("Forward reference {path} cannot be bound to itself")]
    CyclicBinding { path: String },

    #[error("Forward reference {path} still has pending callbacks")]
    StillPending { path: String },

    #[error("Forward call {0} failed and will never resolve")]
    CallFailed(CallId),

    #[error("Callback failed: {message}")]
    Callback { message: String },
}

impl ForwardError {
    pub fn illegal_name(name: impl Into<String>) -> Self {
        Self::IllegalName { name: name.into() }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn undefined_name(name: impl Into<String>) -> Self {
        Self::UndefinedName { name: name.into() }
    }

    pub fn already_bound(path: impl Into<String>) -> Self {
        Self::AlreadyBound { path: path.into() }
    }

    pub fn missing_member(path: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MissingMember {
            path: path.into(),
            member: member.into(),
        }
    }

    pub fn cyclic_binding(path: impl Into<String>) -> Self {
        Self::CyclicBinding { path: path.into() }
    }

    pub fn still_pending(path: impl Into<String>) -> Self {
        Self::StillPending { path: path.into() }
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }
}
