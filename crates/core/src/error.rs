//! Domain error model shared by the warehouse workflows.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failures. Storage and ERP transport failures have their own
/// error types in `forgewms-infra` and `forgewms-erp`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (empty item code, same source and target warehouse).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal workflow transition, e.g. approving a draft transfer.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Stale version or duplicate entry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable code, used as the `error` field of API responses.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Forbidden(_) => "forbidden",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case_and_distinct() {
        let errors = [
            DomainError::validation("x"),
            DomainError::invariant("x"),
            DomainError::invalid_id("x"),
            DomainError::not_found(),
            DomainError::conflict("x"),
            DomainError::forbidden("x"),
        ];
        let mut codes: Vec<&str> = errors.iter().map(DomainError::code).collect();
        assert!(codes.iter().all(|c| c.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_')));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            DomainError::validation("item code cannot be empty").to_string(),
            "validation failed: item code cannot be empty"
        );
        assert_eq!(DomainError::not_found().to_string(), "not found");
    }
}
