use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};
use std::sync::Arc;

use super::auth::Viewer;
use super::permissions::Permission;
use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, CommentDto, CommentRequest, Page, PageQuery,
    PageUrl,
};

/// GET /v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiQuery(query): ApiQuery<PageQuery>,
    url: PageUrl,
) -> Result<Json<Page<CommentDto>>, ApiError> {
    let pagination = query.pagination(&state.config().server)?;

    let paged = state
        .review_service()
        .list_comments(title_id, review_id, pagination.page, pagination.page_size)
        .await?;

    Ok(Json(Page::from_paged(paged, pagination, &url, CommentDto::from)?))
}

/// POST /v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    let author = viewer.require()?;

    let record = state
        .review_service()
        .create_comment(title_id, review_id, author, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
) -> Result<Json<CommentDto>, ApiError> {
    let record = state
        .review_service()
        .get_comment(title_id, review_id, comment_id)
        .await?;

    Ok(Json(record.into()))
}

/// PATCH /v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<Json<CommentDto>, ApiError> {
    let existing = state
        .review_service()
        .get_comment(title_id, review_id, comment_id)
        .await?;
    Permission::AuthorOrStaffOrReadOnly.has_object_permission(
        &Method::PATCH,
        &viewer,
        existing.comment.author_id,
    )?;

    let record = state
        .review_service()
        .update_comment(title_id, review_id, comment_id, payload)
        .await?;

    Ok(Json(record.into()))
}

/// DELETE /v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
) -> Result<StatusCode, ApiError> {
    let existing = state
        .review_service()
        .get_comment(title_id, review_id, comment_id)
        .await?;
    Permission::AuthorOrStaffOrReadOnly.has_object_permission(
        &Method::DELETE,
        &viewer,
        existing.comment.author_id,
    )?;

    state
        .review_service()
        .delete_comment(title_id, review_id, comment_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
