// SPDX-License-Identifier: PMPL-1.0-or-later
//! Security model error types.

use thiserror::Error;

use crate::config::ModelVariant;
use crate::entity::EntityKind;

/// Errors raised by entity managers, the model manager and ACL computation.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// An entity referenced by a grant, revoke or lookup does not exist.
    #[error("unknown {kind}: {name}")]
    UnknownEntity {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Name of the missing entity.
        name: String,
    },

    /// An entity with the same (case-insensitive) name already exists.
    #[error("{kind} already exists: {name}")]
    EntityExists {
        /// Kind of the duplicate entity.
        kind: EntityKind,
        /// Name that collided.
        name: String,
    },

    /// The storage layer behind a manager or the graph failed.
    #[error("data backend error: {0}")]
    DataBackend(String),

    /// A set operation that is deliberately not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The configured model variant has no edge of this kind.
    #[error("operation '{operation}' is not available in the {variant} model")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Variant the model manager was configured with.
        variant: ModelVariant,
    },

    /// Authentication failed for the named user.
    #[error("password mismatch for user: {0}")]
    PasswordMismatch(String),

    #[error("invalid entity name: {0:?}")]
    InvalidName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecurityError {
    /// Shorthand for [`SecurityError::UnknownEntity`].
    pub fn unknown(kind: EntityKind, name: impl Into<String>) -> Self {
        SecurityError::UnknownEntity {
            kind,
            name: name.into(),
        }
    }

    /// Wrap a lock poisoning or backend failure.
    pub(crate) fn backend(context: impl std::fmt::Display) -> Self {
        SecurityError::DataBackend(context.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SecurityError>;
