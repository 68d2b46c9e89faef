//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. All variants except
/// `Conflict` are non-retryable: retrying the same call yields the same error.
/// `Conflict` signals contention (stale version) and is safe to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing reason, zero quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation was attempted outside its required source state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Finalization attempted without both weighings on record.
    #[error("incomplete weighing: {0}")]
    IncompleteWeighing(String),

    /// A ledger append would drive a stockpile balance below zero.
    #[error("balance violation: {0}")]
    BalanceViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested entity was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (stale version / optimistic concurrency). Retryable.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn incomplete_weighing(msg: impl Into<String>) -> Self {
        Self::IncompleteWeighing(msg.into())
    }

    pub fn balance_violation(msg: impl Into<String>) -> Self {
        Self::BalanceViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether a caller may safely retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
