use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, OriginalUri, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{header::HOST, request::Parts},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use super::ApiError;
use crate::config::ServerConfig;
use crate::db::{CatalogEntry, CommentRecord, Paged, ReviewRecord, TitleRecord, User};
use crate::entities::{categories, genres};

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejections are reported as field errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::bad_request(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Path parameters; anything that does not parse is simply not found.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|_: PathRejection| ApiError::not_found())?;
        Ok(Self(value))
    }
}

// ============================================================================
// Pagination
// ============================================================================

const INVALID_PAGE: &str = "Invalid page.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// Page 0 is invalid; a missing or zero page size uses the default,
    /// larger sizes are capped.
    pub fn resolve(
        page: Option<u64>,
        page_size: Option<u64>,
        server: &ServerConfig,
    ) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::NotFound(INVALID_PAGE.to_string()));
        }

        let page_size = match page_size {
            None | Some(0) => server.default_page_size,
            Some(size) => size.min(server.max_page_size),
        };

        Ok(Self { page, page_size })
    }
}

impl PageQuery {
    pub fn pagination(&self, server: &ServerConfig) -> Result<Pagination, ApiError> {
        Pagination::resolve(self.page, self.page_size, server)
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The URL of the current list request, used to build `next`/`previous`.
#[derive(Debug, Clone)]
pub struct PageUrl {
    base: String,
    params: Vec<String>,
}

impl<S> FromRequestParts<S> for PageUrl
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.clone(), |original| original.0.clone());

        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let base = match host {
            Some(host) => format!("http://{host}{}", uri.path()),
            None => uri.path().to_string(),
        };

        let params = uri
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|p| !p.is_empty() && !p.starts_with("page="))
            .map(str::to_string)
            .collect();

        Ok(Self { base, params })
    }
}

impl PageUrl {
    #[must_use]
    pub fn for_page(&self, page: u64) -> String {
        let mut params = self.params.clone();
        if page > 1 {
            params.push(format!("page={page}"));
        }

        if params.is_empty() {
            self.base.clone()
        } else {
            format!("{}?{}", self.base, params.join("&"))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Pages past the last one are not found; page 1 of an empty list is fine.
    pub fn from_paged<R>(
        paged: Paged<R>,
        pagination: Pagination,
        url: &PageUrl,
        map: impl FnMut(R) -> T,
    ) -> Result<Self, ApiError> {
        let Pagination { page, page_size } = pagination;
        if page > 1 && (page - 1).saturating_mul(page_size) >= paged.total {
            return Err(ApiError::NotFound(INVALID_PAGE.to_string()));
        }

        let has_next = page.saturating_mul(page_size) < paged.total;
        let has_previous = page > 1;

        Ok(Self {
            count: paged.total,
            next: has_next.then(|| url.for_page(page + 1)),
            previous: has_previous.then(|| url.for_page(page - 1)),
            results: paged.items.into_iter().map(map).collect(),
        })
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupResponse {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role.as_str().to_string(),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Request body for categories and genres.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// Categories and genres share the `{name, slug}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntryDto {
    pub name: String,
    pub slug: String,
}

impl From<categories::Model> for CatalogEntryDto {
    fn from(model: categories::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

impl From<CatalogEntry> for CatalogEntryDto {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name,
            slug: entry.slug,
        }
    }
}

impl From<genres::Model> for CatalogEntryDto {
    fn from(model: genres::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub genre: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<CatalogEntryDto>,
    pub category: Option<CatalogEntryDto>,
}

impl From<TitleRecord> for TitleDto {
    fn from(record: TitleRecord) -> Self {
        Self {
            id: record.title.id,
            name: record.title.name,
            year: record.title.year,
            rating: record.title.rating,
            description: record.title.description,
            genre: record.genres.into_iter().map(CatalogEntryDto::from).collect(),
            category: record.category.map(CatalogEntryDto::from),
        }
    }
}

// ============================================================================
// Reviews & comments
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRequest {
    pub text: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: String,
}

impl From<ReviewRecord> for ReviewDto {
    fn from(record: ReviewRecord) -> Self {
        Self {
            id: record.review.id,
            text: record.review.text,
            author: record.author,
            score: record.review.score,
            pub_date: record.review.pub_date,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: String,
}

impl From<CommentRecord> for CommentDto {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.comment.id,
            text: record.comment.text,
            author: record.author,
            pub_date: record.comment.pub_date,
        }
    }
}
