//! Domain service for sign-up, confirmation codes and bearer tokens.
//!
//! Accounts have no passwords: a confirmation code is mailed on sign-up and
//! exchanged once for a bearer token.

use thiserror::Error;

use crate::api::types::{SignupRequest, SignupResponse, TokenRequest};
use crate::db::User;
use crate::domain::validation::FieldErrors;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid confirmation code")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Registers the identity (or finds the identical existing one) and mails
    /// it a fresh confirmation code.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for malformed or colliding identities.
    async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, AuthError>;

    /// Consumes a confirmation code and issues a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] for an unknown username and
    /// [`AuthError::InvalidCredentials`] for a wrong or expired code.
    async fn exchange_token(&self, request: TokenRequest) -> Result<String, AuthError>;

    /// Resolves a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the token is unknown or expired.
    async fn authenticate(&self, token: &str) -> Result<User, AuthError>;

    /// Creates a superuser (or promotes the identical existing account) and
    /// returns it with a fresh confirmation code.
    async fn create_superuser(&self, username: &str, email: &str)
    -> Result<(User, String), AuthError>;
}
