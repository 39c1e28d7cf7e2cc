use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::info;

use super::auth::Viewer;
use super::validation::{UserInput, validate_user};
use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, Page, PageQuery, PageUrl, UserDto,
    UserRequest,
};
use crate::db::{NewUser, User, UserChanges, is_unique_violation};
use crate::domain::validation::{FieldErrors, NON_FIELD};
use crate::services::auth_service_impl::{EMAIL_TAKEN, USERNAME_TAKEN};

/// GET /v1/users/
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PageQuery>,
    url: PageUrl,
) -> Result<Json<Page<UserDto>>, ApiError> {
    let pagination = query.pagination(&state.config().server)?;

    let paged = state
        .store()
        .users()
        .list(pagination.page, pagination.page_size, query.search())
        .await?;

    Ok(Json(Page::from_paged(paged, pagination, &url, UserDto::from)?))
}

/// POST /v1/users/
/// Unlike sign-up, an existing username or email is always an error
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<UserRequest>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let input = validate_user(payload, false)?;
    let username = input.username.unwrap_or_default();
    let email = input.email.unwrap_or_default();

    check_unique(&state, None, Some(&username), Some(&email)).await?;

    let user = state
        .store()
        .users()
        .create(NewUser {
            username,
            email,
            first_name: input.first_name.flatten(),
            last_name: input.last_name.flatten(),
            bio: input.bio.flatten(),
            role: input.role.unwrap_or_default(),
            is_superuser: false,
        })
        .await
        .map_err(identity_conflict)?;

    info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /v1/users/{username}/
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<UserDto>, ApiError> {
    let user = find_user(&state, &username).await?;
    Ok(Json(user.into()))
}

/// PATCH /v1/users/{username}/
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    ApiPath(username): ApiPath<String>,
    ApiJson(payload): ApiJson<UserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    let user = find_user(&state, &username).await?;
    let input = validate_user(payload, true)?;

    let updated = apply_changes(&state, &user, input).await?;
    Ok(Json(updated.into()))
}

/// DELETE /v1/users/{username}/
/// Also removes the user's reviews and comments
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    ApiPath(username): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let user = find_user(&state, &username).await?;

    if state.store().users().delete(user.id).await? {
        info!(user_id = user.id, username = %user.username, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

/// GET /v1/users/me/
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<UserDto>, ApiError> {
    let current = viewer.require()?;

    let user = state
        .store()
        .users()
        .get_by_id(current.id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(user.into()))
}

/// PATCH /v1/users/me/
/// `role` is ignored here; only admins change roles
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiJson(payload): ApiJson<UserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    let current = viewer.require()?;

    let user = state
        .store()
        .users()
        .get_by_id(current.id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let input = validate_user(
        UserRequest {
            role: None,
            ..payload
        },
        true,
    )?;

    let updated = apply_changes(&state, &user, input).await?;
    Ok(Json(updated.into()))
}

async fn find_user(state: &AppState, username: &str) -> Result<User, ApiError> {
    state
        .store()
        .users()
        .get_by_username(username)
        .await?
        .ok_or_else(ApiError::not_found)
}

async fn apply_changes(state: &AppState, user: &User, input: UserInput) -> Result<User, ApiError> {
    check_unique(
        state,
        Some(user.id),
        input.username.as_deref(),
        input.email.as_deref(),
    )
    .await?;

    let changes = UserChanges {
        username: input.username,
        email: input.email,
        first_name: input.first_name,
        last_name: input.last_name,
        bio: input.bio,
        role: input.role,
    };

    state
        .store()
        .users()
        .update(user.id, changes)
        .await
        .map_err(identity_conflict)
}

/// Rejects a username or email that belongs to an account other than `own_id`.
async fn check_unique(
    state: &AppState,
    own_id: Option<i32>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    if let Some(username) = username
        && let Some(other) = state.store().users().get_by_username(username).await?
        && Some(other.id) != own_id
    {
        errors.add("username", USERNAME_TAKEN);
    }

    if let Some(email) = email
        && let Some(other) = state.store().users().get_by_email(email).await?
        && Some(other.id) != own_id
    {
        errors.add("email", EMAIL_TAKEN);
    }

    errors.into_result()?;
    Ok(())
}

fn identity_conflict(err: anyhow::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::field(NON_FIELD, "A user with that username or email already exists.")
    } else {
        err.into()
    }
}
