//! Domain error type
//!
//! Value objects and vocabulary enums reject bad input at construction time.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value broke a game rule (NPC count out of range, empty rule name, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Text did not name a known variant
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
