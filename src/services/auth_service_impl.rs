//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};

use crate::api::types::{SignupRequest, SignupResponse, TokenRequest};
use crate::config::Config;
use crate::db::repositories::user::{generate_confirmation_code, hash_secret};
use crate::db::{NewUser, Store, User, format_timestamp, is_unique_violation};
use crate::domain::Role;
use crate::domain::validation::{
    FieldErrors, NON_FIELD, REQUIRED, validate_email, validate_username,
};
use crate::mail::Mailer;
use crate::services::auth_service::{AuthError, AuthService};

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const EMAIL_TAKEN: &str = "A user with that email already exists.";

pub struct SeaOrmAuthService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    config: Arc<Config>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, config: Arc<Config>) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Field checks for a sign-up identity; both fields are reported together.
    fn validate_identity_fields(
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<(String, String), AuthError> {
        let mut errors = FieldErrors::new();

        let username = username.map(str::trim).unwrap_or_default();
        let email = email.map(str::trim).unwrap_or_default();

        errors.check("username", validate_username(username));
        errors.check("email", validate_email(email));
        errors.into_result()?;

        Ok((username.to_string(), email.to_string()))
    }

    /// Returns the existing account when username and email both match it,
    /// `None` when neither is taken, and a field error on a partial collision.
    async fn resolve_identity(&self, username: &str, email: &str) -> Result<Option<User>, AuthError> {
        if let Some(user) = self.store.users().get_by_username(username).await? {
            if user.email == email {
                return Ok(Some(user));
            }
            return Err(FieldErrors::single("username", USERNAME_TAKEN).into());
        }

        if self.store.users().get_by_email(email).await?.is_some() {
            return Err(FieldErrors::single("email", EMAIL_TAKEN).into());
        }

        Ok(None)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        match self.store.users().create(new_user).await {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(FieldErrors::single(
                NON_FIELD,
                "A user with that username or email already exists.",
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Generates a code, stores only its hash and expiry, and returns the code.
    async fn issue_code(&self, user: &User) -> Result<String, AuthError> {
        let code = generate_confirmation_code(self.config.auth.confirmation_code_length);
        let expires_at = Utc::now()
            + chrono::Duration::minutes(i64::from(self.config.auth.confirmation_code_ttl_minutes));

        let security = self.config.security.clone();
        let to_hash = code.clone();
        let code_hash = task::spawn_blocking(move || hash_secret(&to_hash, Some(&security)))
            .await
            .map_err(|e| AuthError::Internal(format!("Code hashing task failed: {e}")))??;

        self.store
            .users()
            .set_confirmation_code(user.id, code_hash, format_timestamp(expires_at))
            .await?;

        Ok(code)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, AuthError> {
        let (username, email) =
            Self::validate_identity_fields(request.username.as_deref(), request.email.as_deref())?;

        let user = match self.resolve_identity(&username, &email).await? {
            Some(existing) => existing,
            None => {
                let user = self
                    .create_user(NewUser {
                        username: username.clone(),
                        email: email.clone(),
                        ..Default::default()
                    })
                    .await?;
                info!(user_id = user.id, username = %user.username, "User signed up");
                user
            }
        };

        let code = self.issue_code(&user).await?;
        self.mailer
            .send_confirmation_code(&user.username, &user.email, &code)
            .await?;

        Ok(SignupResponse {
            email: user.email,
            username: user.username,
        })
    }

    async fn exchange_token(&self, request: TokenRequest) -> Result<String, AuthError> {
        let mut errors = FieldErrors::new();
        let username = request.username.unwrap_or_default();
        let code = request.confirmation_code.unwrap_or_default();
        if username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if code.trim().is_empty() {
            errors.add("confirmation_code", REQUIRED);
        }
        errors.into_result()?;

        let user = self
            .store
            .users()
            .get_by_username(username.trim())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .store
            .users()
            .consume_confirmation_code(user.id, code.trim())
            .await?
        {
            warn!(username = %user.username, "Rejected confirmation code");
            return Err(AuthError::InvalidCredentials);
        }

        let purged = self.store.tokens().purge_expired().await?;
        if purged > 0 {
            info!(count = purged, "Purged expired access tokens");
        }

        let ttl = chrono::Duration::hours(i64::from(self.config.auth.access_token_ttl_hours));
        let token = self.store.tokens().issue(user.id, ttl).await?;

        info!(user_id = user.id, "Access token issued");
        Ok(token)
    }

    async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        self.store
            .tokens()
            .resolve(token)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    async fn create_superuser(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(User, String), AuthError> {
        let (username, email) = Self::validate_identity_fields(Some(username), Some(email))?;

        let user = match self.resolve_identity(&username, &email).await? {
            Some(existing) => self.store.users().promote_to_superuser(existing.id).await?,
            None => {
                self.create_user(NewUser {
                    username,
                    email,
                    role: Role::Admin,
                    is_superuser: true,
                    ..Default::default()
                })
                .await?
            }
        };

        let code = self.issue_code(&user).await?;
        info!(user_id = user.id, username = %user.username, "Superuser ready");
        Ok((user, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_fields_are_reported_together() {
        let Err(AuthError::Validation(errors)) =
            SeaOrmAuthService::validate_identity_fields(Some("me"), Some("not-an-email"))
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("username"));
        assert!(errors.contains("email"));
    }

    #[test]
    fn test_identity_fields_missing() {
        let Err(AuthError::Validation(errors)) =
            SeaOrmAuthService::validate_identity_fields(None, None)
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(errors.get("email"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn test_identity_fields_trimmed() {
        let (username, email) =
            SeaOrmAuthService::validate_identity_fields(Some(" bob "), Some("b@x.com")).unwrap();
        assert_eq!(username, "bob");
        assert_eq!(email, "b@x.com");
    }
}
