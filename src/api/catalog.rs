//! Handlers shared by `/v1/categories/` and `/v1/genres/`.
//!
//! Each handler is generic over the [`CatalogRepository`] it serves and is
//! mounted once per table in the router.

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::info;

use super::validation::validate_catalog_entry;
use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, CatalogEntryDto, CatalogEntryRequest, Page,
    PageQuery, PageUrl,
};
use crate::db::{CatalogRepository, is_unique_violation};
use crate::domain::validation::FieldErrors;

fn slug_taken<R: CatalogRepository>() -> String {
    format!("{} with this slug already exists.", R::KIND)
}

/// GET /v1/{categories,genres}/
pub async fn list_entries<R: CatalogRepository>(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PageQuery>,
    url: PageUrl,
) -> Result<Json<Page<CatalogEntryDto>>, ApiError> {
    let pagination = query.pagination(&state.config().server)?;

    let paged = R::from_store(state.store())
        .list(pagination.page, pagination.page_size, query.search())
        .await?;

    Ok(Json(Page::from_paged(
        paged,
        pagination,
        &url,
        CatalogEntryDto::from,
    )?))
}

/// POST /v1/{categories,genres}/
pub async fn create_entry<R: CatalogRepository>(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntryDto>), ApiError> {
    let repo = R::from_store(state.store());
    let input = validate_catalog_entry(payload, false)?;
    let name = input.name.unwrap_or_default();
    let slug = input.slug.unwrap_or_default();

    if repo.get_by_slug(&slug).await?.is_some() {
        return Err(ApiError::field("slug", slug_taken::<R>()));
    }

    let entry = repo
        .create(name, slug)
        .await
        .map_err(slug_conflict::<R>)?;

    info!(kind = R::KIND, slug = %entry.slug, "Catalog entry created");
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// GET /v1/{categories,genres}/{slug}/
pub async fn get_entry<R: CatalogRepository>(
    State(state): State<Arc<AppState>>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<CatalogEntryDto>, ApiError> {
    let entry = R::from_store(state.store())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(entry.into()))
}

/// PATCH /v1/{categories,genres}/{slug}/
pub async fn update_entry<R: CatalogRepository>(
    State(state): State<Arc<AppState>>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(payload): ApiJson<CatalogEntryRequest>,
) -> Result<Json<CatalogEntryDto>, ApiError> {
    let repo = R::from_store(state.store());
    let existing = repo
        .get_by_slug(&slug)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let input = validate_catalog_entry(payload, true)?;

    if let Some(new_slug) = &input.slug
        && new_slug != &existing.slug
        && repo.get_by_slug(new_slug).await?.is_some()
    {
        return Err(ApiError::field("slug", slug_taken::<R>()));
    }

    let entry = repo
        .update(existing, input.name, input.slug)
        .await
        .map_err(slug_conflict::<R>)?;

    Ok(Json(entry.into()))
}

/// DELETE /v1/{categories,genres}/{slug}/
/// Linked titles are kept; they only lose the reference
pub async fn delete_entry<R: CatalogRepository>(
    State(state): State<Arc<AppState>>,
    ApiPath(slug): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    if R::from_store(state.store()).delete(&slug).await? {
        info!(kind = R::KIND, slug = %slug, "Catalog entry deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

fn slug_conflict<R: CatalogRepository>(err: anyhow::Error) -> ApiError {
    if is_unique_violation(&err) {
        FieldErrors::single("slug", slug_taken::<R>()).into()
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CategoryRepository, GenreRepository};

    #[test]
    fn test_slug_taken_names_the_table() {
        assert_eq!(
            slug_taken::<CategoryRepository>(),
            "category with this slug already exists."
        );
        assert_eq!(
            slug_taken::<GenreRepository>(),
            "genre with this slug already exists."
        );
    }
}
