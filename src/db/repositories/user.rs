use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use std::collections::BTreeSet;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::{Paged, now_timestamp, parse_timestamp};
use crate::domain::{CurrentUser, Role};
use crate::entities::{auth_tokens, comments, prelude::*, reviews, users};

/// User data returned from repository (without the confirmation code hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_superuser: bool,
    pub date_joined: String,
}

impl User {
    #[must_use]
    pub fn as_current(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            is_superuser: self.is_superuser,
        }
    }
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
            role: model.role.parse().unwrap_or_default(),
            is_superuser: model.is_superuser,
            date_joined: model.date_joined,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_superuser: bool,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub role: Option<Role>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Lists users ordered by id, optionally filtered by a username substring.
    pub async fn list(&self, page: u64, page_size: u64, search: Option<&str>) -> Result<Paged<User>> {
        let mut query = Users::find().order_by_asc(users::Column::Id);

        if let Some(term) = search.filter(|s| !s.is_empty()) {
            query = query.filter(users::Column::Username.contains(term));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items: items.into_iter().map(User::from).collect(),
            total,
        })
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = now_timestamp();

        let model = users::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            bio: Set(new_user.bio),
            role: Set(new_user.role.as_str().to_string()),
            is_superuser: Set(new_user.is_superuser),
            confirmation_code_hash: Set(None),
            confirmation_code_expires_at: Set(None),
            date_joined: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn update(&self, id: i32, changes: UserChanges) -> Result<User> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(bio) = changes.bio {
            active.bio = Set(bio);
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        active.updated_at = Set(now_timestamp());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(User::from(model))
    }

    /// Makes an existing account a superuser admin.
    pub async fn promote_to_superuser(&self, id: i32) -> Result<User> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.role = Set(Role::Admin.as_str().to_string());
        active.is_superuser = Set(true);
        active.updated_at = Set(now_timestamp());

        Ok(User::from(active.update(&self.conn).await?))
    }

    /// Deletes a user with their tokens, reviews and comments, then refreshes
    /// the ratings of every title that lost a review.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let result = Users::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        let affected_titles: BTreeSet<i32> = Reviews::find()
            .select_only()
            .column(reviews::Column::TitleId)
            .filter(reviews::Column::AuthorId.eq(id))
            .into_tuple::<i32>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();

        let review_ids: Vec<i32> = Reviews::find()
            .select_only()
            .column(reviews::Column::Id)
            .filter(reviews::Column::AuthorId.eq(id))
            .into_tuple::<i32>()
            .all(&txn)
            .await?;

        Comments::delete_many()
            .filter(
                comments::Column::AuthorId
                    .eq(id)
                    .or(comments::Column::ReviewId.is_in(review_ids)),
            )
            .exec(&txn)
            .await?;

        Reviews::delete_many()
            .filter(reviews::Column::AuthorId.eq(id))
            .exec(&txn)
            .await?;

        AuthTokens::delete_many()
            .filter(auth_tokens::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        for title_id in affected_titles {
            super::title::recompute_rating(&txn, title_id).await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Replaces the pending confirmation code of a user.
    pub async fn set_confirmation_code(
        &self,
        id: i32,
        code_hash: String,
        expires_at: String,
    ) -> Result<()> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for confirmation code")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.confirmation_code_hash = Set(Some(code_hash));
        active.confirmation_code_expires_at = Set(Some(expires_at));
        active.updated_at = Set(now_timestamp());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Verifies a confirmation code and spends it.
    ///
    /// Argon2 runs under `spawn_blocking`. The code is cleared with an update
    /// conditioned on the hash that was verified, so when two exchanges race
    /// on one code only the first to clear it gets `true`.
    pub async fn consume_confirmation_code(&self, id: i32, code: &str) -> Result<bool> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for code verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let (Some(code_hash), Some(expires_at)) =
            (user.confirmation_code_hash, user.confirmation_code_expires_at)
        else {
            return Ok(false);
        };

        let not_expired =
            parse_timestamp(&expires_at).is_some_and(|expires| expires > chrono::Utc::now());
        if !not_expired {
            return Ok(false);
        }

        let code = code.to_string();
        let hash = code_hash.clone();
        let matches = task::spawn_blocking(move || verify_secret(&code, &hash))
            .await
            .context("Code verification task panicked")??;
        if !matches {
            return Ok(false);
        }

        let result = Users::update_many()
            .col_expr(
                users::Column::ConfirmationCodeHash,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                users::Column::ConfirmationCodeExpiresAt,
                Expr::value(Option::<String>::None),
            )
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::ConfirmationCodeHash.eq(code_hash))
            .exec(&self.conn)
            .await
            .context("Failed to consume confirmation code")?;

        Ok(result.rows_affected == 1)
    }
}

/// Hash a secret using Argon2id with optional custom params.
/// If config is None, uses the library default params.
pub fn hash_secret(secret: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {e}"))?;

    Ok(hash.to_string())
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a random confirmation code of `length` alphanumeric characters.
#[must_use]
pub fn generate_confirmation_code(length: usize) -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;

    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
