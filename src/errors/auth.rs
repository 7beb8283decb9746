//! Authentication and authorisation error types

use thiserror::Error;

use super::CoreError;

/// Authentication and authorisation errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing authentication
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Principal header was present but unusable
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    /// Unknown permission name
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::AuthenticationRequired | AuthError::InvalidPrincipal(_) => {
                CoreError::unauthorized(err.to_string())
            }
            AuthError::InvalidPermission(_) => CoreError::validation(err.to_string()),
            AuthError::Database(_) => CoreError::internal(err.to_string()),
        }
    }
}
