//! Authentication and authorization error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token expired")]
    Expired,

    #[error("invalid issuer")]
    WrongIssuer,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    #[error("permission denied: {action} on {subject}")]
    PermissionDenied { action: &'static str, subject: String },
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::PermissionDenied { .. } => tonic::Status::permission_denied(err.to_string()),
            _ => tonic::Status::unauthenticated(err.to_string()),
        }
    }
}
