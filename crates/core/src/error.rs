//! Domain error model.

use thiserror::Error;

/// Result type used across the warehouse layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure surfaced to a caller ends up as one of these variants. Lower
/// layers (controller channel, reply parser, persistence) keep their own error
/// enums and convert into this one at the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced system, terminal, location or recipe does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate registration, or a second controller for a bound system.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation needs a live controller binding and none exists.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Input failed structural validation before reaching the core.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A model invariant would be violated (bin capacity, aisle shape, ...).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A controller reply could not be parsed, or the connection was lost
    /// while a command was in flight.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation is part of the contract but has no execution algorithm.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Reading or writing persisted state failed.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Short machine-readable code (used in API error bodies and logs).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::PreconditionFailed(_) => "precondition_failed",
            DomainError::MalformedInput(_) => "malformed_input",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::Protocol(_) => "protocol_error",
            DomainError::NotImplemented(_) => "not_implemented",
            DomainError::Persistence(_) => "persistence_error",
        }
    }
}
