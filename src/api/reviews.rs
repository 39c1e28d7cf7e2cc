use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};
use std::sync::Arc;

use super::auth::Viewer;
use super::permissions::Permission;
use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, Page, PageQuery, PageUrl, ReviewDto,
    ReviewRequest,
};

/// GET /v1/titles/{title_id}/reviews/
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    ApiPath(title_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<PageQuery>,
    url: PageUrl,
) -> Result<Json<Page<ReviewDto>>, ApiError> {
    let pagination = query.pagination(&state.config().server)?;

    let paged = state
        .review_service()
        .list_reviews(title_id, pagination.page, pagination.page_size)
        .await?;

    Ok(Json(Page::from_paged(paged, pagination, &url, ReviewDto::from)?))
}

/// POST /v1/titles/{title_id}/reviews/
/// One review per user and title
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(title_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewDto>), ApiError> {
    let author = viewer.require()?;

    let record = state
        .review_service()
        .create_review(title_id, author, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /v1/titles/{title_id}/reviews/{review_id}/
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
) -> Result<Json<ReviewDto>, ApiError> {
    let record = state
        .review_service()
        .get_review(title_id, review_id)
        .await?;

    Ok(Json(record.into()))
}

/// PATCH /v1/titles/{title_id}/reviews/{review_id}/
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiJson(payload): ApiJson<ReviewRequest>,
) -> Result<Json<ReviewDto>, ApiError> {
    let existing = state
        .review_service()
        .get_review(title_id, review_id)
        .await?;
    Permission::AuthorOrStaffOrReadOnly.has_object_permission(
        &Method::PATCH,
        &viewer,
        existing.review.author_id,
    )?;

    let record = state
        .review_service()
        .update_review(title_id, review_id, payload)
        .await?;

    Ok(Json(record.into()))
}

/// DELETE /v1/titles/{title_id}/reviews/{review_id}/
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    let existing = state
        .review_service()
        .get_review(title_id, review_id)
        .await?;
    Permission::AuthorOrStaffOrReadOnly.has_object_permission(
        &Method::DELETE,
        &viewer,
        existing.review.author_id,
    )?;

    state
        .review_service()
        .delete_review(title_id, review_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
