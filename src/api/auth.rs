use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;

use super::{ApiError, ApiJson, AppState};
use crate::api::types::{SignupRequest, SignupResponse, TokenRequest, TokenResponse};
use crate::domain::CurrentUser;

// ============================================================================
// Viewer
// ============================================================================

/// Who is making the request; `None` for anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<CurrentUser>);

impl Viewer {
    /// The authenticated user, or 401.
    pub fn require(&self) -> Result<&CurrentUser, ApiError> {
        self.0.as_ref().ok_or_else(ApiError::not_authenticated)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(CurrentUser::is_admin)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` into a [`Viewer`] extension.
///
/// Requests without a bearer token continue anonymously; an unknown or
/// expired token is rejected with 401 on every endpoint.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match extract_bearer_token(request.headers()) {
        Some(token) => {
            let user = state.auth_service().authenticate(&token).await?;
            tracing::Span::current().record("user_id", user.id);
            Viewer(Some(user.as_current()))
        }
        None => Viewer(None),
    };

    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/auth/signup/
/// Registers a user (or re-sends a code to an identical one)
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    let response = state.auth_service().signup(payload).await?;
    Ok(Json(response))
}

/// POST /v1/auth/token/
/// Exchanges a confirmation code for a bearer token
pub async fn token(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.auth_service().exchange_token(payload).await?;
    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc")).as_deref(), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("bearer  abc ")).as_deref(), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("Basic Zm9vOmJhcg==")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_viewer_require() {
        assert!(Viewer(None).require().is_err());
        assert!(!Viewer(None).is_admin());
    }
}
