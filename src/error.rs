//! Error taxonomy shared by every layer of the vault.
//!
//! Each variant maps to one stable outcome at the transport boundary; the
//! response body only ever carries the short message, never internals.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::io;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Unknown owner, unknown file or unknown trash entry
    #[error("not found: {0}")]
    NotFound(String),

    /// Access-policy denial or missing admin capability
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Storage I/O failed
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// Internal state that should not occur, such as bytes stored without a
    /// matching metadata record
    #[error("server fault: {0}")]
    ServerFault(String),
}

impl VaultError {
    pub fn not_found(what: impl Into<String>) -> Self {
        VaultError::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        VaultError::Forbidden(why.into())
    }

    pub fn invalid(why: impl Into<String>) -> Self {
        VaultError::InvalidInput(why.into())
    }

    pub fn backend(why: impl Into<String>) -> Self {
        VaultError::BackendFailure(why.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }

    /// Classify a filesystem error; a missing path becomes `NotFound` for `what`.
    pub fn from_io(err: io::Error, what: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => VaultError::NotFound(what.to_string()),
            _ => VaultError::BackendFailure(format!("{}: {}", what, err)),
        }
    }

    fn public_message(&self) -> String {
        match self {
            VaultError::NotFound(msg)
            | VaultError::Forbidden(msg)
            | VaultError::Conflict(msg)
            | VaultError::InvalidInput(msg) => msg.clone(),
            VaultError::BackendFailure(_) => "Storage backend unavailable".to_string(),
            VaultError::ServerFault(_) => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for VaultError {
    fn status_code(&self) -> StatusCode {
        match self {
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::Forbidden(_) => StatusCode::FORBIDDEN,
            VaultError::Conflict(_) => StatusCode::CONFLICT,
            VaultError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VaultError::BackendFailure(_) => StatusCode::BAD_GATEWAY,
            VaultError::ServerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            VaultError::from_io(err, "alice/a.txt"),
            VaultError::NotFound("alice/a.txt".to_string())
        );

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            VaultError::from_io(err, "alice/a.txt"),
            VaultError::BackendFailure(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(VaultError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(VaultError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(VaultError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(VaultError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(VaultError::backend("x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            VaultError::ServerFault("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = VaultError::backend("/srv/data/alice: permission denied");
        assert_eq!(err.public_message(), "Storage backend unavailable");

        let err = VaultError::not_found("File does not exist");
        assert_eq!(err.public_message(), "File does not exist");
    }
}
