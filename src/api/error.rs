use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::domain::validation::{FieldErrors, NON_FIELD};
use crate::services::{AuthError, ReviewError};

pub const NOT_FOUND: &str = "Not found.";
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(FieldErrors),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            ApiError::ValidationError(errors) => write!(f, "Validation error: {errors}"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::ValidationError(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            ApiError::Unauthorized(msg) => {
                let mut response =
                    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": msg }))).into_response();
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"api\""));
                return response;
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => ApiError::ValidationError(errors),
            AuthError::UserNotFound => ApiError::not_found(),
            AuthError::InvalidCredentials => ApiError::field("confirmation_code", "Invalid confirmation code."),
            AuthError::InvalidToken => ApiError::Unauthorized(INVALID_TOKEN.to_string()),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::TitleNotFound(_)
            | ReviewError::ReviewNotFound(_)
            | ReviewError::CommentNotFound(_) => ApiError::not_found(),
            ReviewError::Validation(errors) => ApiError::ValidationError(errors),
            ReviewError::Conflict(msg) => ApiError::bad_request(msg),
            ReviewError::Database(msg) => ApiError::DatabaseError(msg),
            ReviewError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn not_found() -> Self {
        ApiError::NotFound(NOT_FOUND.to_string())
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        ApiError::Unauthorized(NOT_AUTHENTICATED.to_string())
    }

    #[must_use]
    pub fn permission_denied() -> Self {
        ApiError::Forbidden(PERMISSION_DENIED.to_string())
    }

    /// A 400 not tied to a particular field.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(FieldErrors::single(NON_FIELD, msg))
    }

    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        ApiError::ValidationError(FieldErrors::single(field, msg))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
