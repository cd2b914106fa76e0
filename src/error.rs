//! Error types for livebind.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! specific condition (a missing binding, a duplicate key, a dead watcher).

use thiserror::Error;

use crate::context::OwnerId;

/// Validation errors raised while building or attaching bindings.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Attribute name cannot be empty")]
    EmptyAttributeName,

    #[error("Refresh key cannot be empty")]
    EmptyRefreshKey,

    #[error("Refresh key '{key}' appears more than once in the same rule")]
    DuplicateRefreshKey {
        key: String,
    },

    #[error("Attribute '{name}' is already bound for owner {owner}")]
    DuplicateBinding {
        owner: OwnerId,
        name: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors raised while running bindings.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Binding not found: owner {owner}, attribute '{name}'")]
    BindingNotFound {
        owner: OwnerId,
        name: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Queue full on {path} (capacity {capacity})")]
    QueueFull {
        path: String,
        capacity: usize,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },
}

/// Failure reported by an external event source when a watcher subscribes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Subscription failed: {reason}")]
pub struct SubscribeError {
    /// Human readable cause.
    pub reason: String,
}

impl SubscribeError {
    /// Creates a subscribe error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for livebind.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BindError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this is a lookup miss in the name registry.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::BindingNotFound { .. }))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Validation errors won't change on retry
            Self::Execution(e) => {
                matches!(e, ExecutionError::Timeout { .. } | ExecutionError::QueueFull { .. })
            }
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for livebind operations.
pub type BindResult<T> = Result<T, BindError>;
