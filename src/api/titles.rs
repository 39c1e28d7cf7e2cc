use axum::{Json, extract::State, http::StatusCode};
use chrono::Datelike;
use std::sync::Arc;
use tracing::info;

use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, Page, PageUrl, Pagination, TitleDto,
    TitleQuery, TitleRequest,
};
use crate::db::{CatalogRepository, NewTitle, TitleChanges, TitleFilter};
use crate::domain::validation::{FieldErrors, REQUIRED, validate_name, validate_year};

const EMPTY_LIST: &str = "This list may not be empty.";

fn does_not_exist(slug: &str) -> String {
    format!("Object with slug={slug} does not exist.")
}

/// GET /v1/titles/
/// Filters: `category` and `genre` by slug, `name` and `year` exact
pub async fn list_titles(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TitleQuery>,
    url: PageUrl,
) -> Result<Json<Page<TitleDto>>, ApiError> {
    let pagination = Pagination::resolve(query.page, query.page_size, &state.config().server)?;

    let filter = TitleFilter {
        category: query.category.filter(|s| !s.is_empty()),
        genre: query.genre.filter(|s| !s.is_empty()),
        name: query.name.filter(|s| !s.is_empty()),
        year: query.year,
    };

    let paged = state
        .store()
        .titles()
        .list(&filter, pagination.page, pagination.page_size)
        .await?;

    Ok(Json(Page::from_paged(paged, pagination, &url, TitleDto::from)?))
}

/// POST /v1/titles/
pub async fn create_title(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TitleRequest>,
) -> Result<(StatusCode, Json<TitleDto>), ApiError> {
    let changes = resolve_title_request(&state, payload, false).await?;

    let new_title = NewTitle {
        name: changes.name.unwrap_or_default(),
        year: changes.year.unwrap_or_default(),
        description: changes.description.flatten(),
        category_id: changes.category_id.flatten(),
        genre_ids: changes.genre_ids.unwrap_or_default(),
    };

    let record = state.store().titles().create(new_title).await?;
    info!(title_id = record.title.id, name = %record.title.name, "Title created");

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /v1/titles/{title_id}/
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<TitleDto>, ApiError> {
    let record = state
        .store()
        .titles()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(record.into()))
}

/// PATCH /v1/titles/{title_id}/
pub async fn update_title(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<TitleRequest>,
) -> Result<Json<TitleDto>, ApiError> {
    if !state.store().titles().exists(id).await? {
        return Err(ApiError::not_found());
    }

    let changes = resolve_title_request(&state, payload, true).await?;

    let record = state
        .store()
        .titles()
        .update(id, changes)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(record.into()))
}

/// DELETE /v1/titles/{title_id}/
/// Removes the title's reviews and their comments too
pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    if state.store().titles().delete(id).await? {
        info!(title_id = id, "Title deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

/// Validates a title body and resolves genre/category slugs to ids.
async fn resolve_title_request(
    state: &AppState,
    request: TitleRequest,
    partial: bool,
) -> Result<TitleChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let mut changes = TitleChanges::default();

    match request.name {
        Some(name) => {
            errors.check("name", validate_name(&name));
            changes.name = Some(name.trim().to_string());
        }
        None if !partial => errors.add("name", REQUIRED),
        None => {}
    }

    match request.year {
        Some(year) => {
            errors.check("year", validate_year(year, chrono::Utc::now().year()));
            changes.year = Some(year);
        }
        None if !partial => errors.add("year", REQUIRED),
        None => {}
    }

    changes.description = request.description;

    match request.genre {
        Some(slugs) if slugs.is_empty() => errors.add("genre", EMPTY_LIST),
        Some(slugs) => match state.store().genres().resolve_slugs(&slugs).await? {
            Ok(genres) => changes.genre_ids = Some(genres.into_iter().map(|g| g.id).collect()),
            Err(missing) => {
                for slug in missing {
                    errors.add("genre", does_not_exist(&slug));
                }
            }
        },
        None if !partial => errors.add("genre", REQUIRED),
        None => {}
    }

    match request.category {
        Some(Some(slug)) => match state.store().categories().get_by_slug(&slug).await? {
            Some(category) => changes.category_id = Some(Some(category.id)),
            None => errors.add("category", does_not_exist(&slug)),
        },
        Some(None) => changes.category_id = Some(None),
        None => {}
    }

    errors.into_result()?;
    Ok(changes)
}
