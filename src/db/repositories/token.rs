use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::user::User;
use crate::db::{format_timestamp, now_timestamp, parse_timestamp};
use crate::entities::{auth_tokens, prelude::*};

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Stores a fresh bearer token for `user_id` and returns it.
    pub async fn issue(&self, user_id: i32, ttl: Duration) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();

        AuthTokens::insert(auth_tokens::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user_id),
            created_at: Set(format_timestamp(now)),
            expires_at: Set(format_timestamp(now + ttl)),
            ..Default::default()
        })
        .exec(&self.conn)
        .await
        .context("Failed to store access token")?;

        Ok(token)
    }

    /// Resolves an unexpired token to its user.
    pub async fn resolve(&self, token: &str) -> Result<Option<User>> {
        let row = AuthTokens::find()
            .filter(auth_tokens::Column::Token.eq(token))
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to query access token")?;

        let Some((token, Some(user))) = row else {
            return Ok(None);
        };

        let valid = parse_timestamp(&token.expires_at).is_some_and(|at| at > Utc::now());
        Ok(valid.then(|| User::from(user)))
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = AuthTokens::delete_many()
            .filter(auth_tokens::Column::ExpiresAt.lte(now_timestamp()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Generate a random bearer token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
