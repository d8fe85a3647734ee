//! Service layer error types
//!
//! Errors the game service hands back to its caller. REST failures keep
//! their `ApiError`; local validation happens before any request is sent.

use thiserror::Error;

use rulehaunt_domain::DomainError;

use crate::ports::outbound::{ApiError, ErrorEnvelope};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    Validation(#[from] DomainError),

    /// Operation needs a game but none is loaded
    #[error("No active game")]
    NoActiveGame,

    #[error("Not enough fear points: need {required}, have {available}")]
    InsufficientFear { required: u32, available: i64 },
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Api(e) if e.is_not_found())
    }

    /// Uniform `{success:false, error, statusCode}` shape.
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ServiceError::Api(e) => e.envelope(),
            other => ErrorEnvelope {
                success: false,
                error: other.to_string(),
                status_code: None,
            },
        }
    }
}
