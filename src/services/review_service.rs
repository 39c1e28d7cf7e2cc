//! Domain service for reviews and their comments.
//!
//! Reviews are scoped to a title and comments to a review; every lookup
//! checks the whole chain so a comment is never reachable through the wrong
//! title.

use thiserror::Error;

use crate::api::types::{CommentRequest, ReviewRequest};
use crate::db::{CommentRecord, Paged, ReviewRecord};
use crate::domain::CurrentUser;
use crate::domain::validation::FieldErrors;

pub const DUPLICATE_REVIEW: &str = "You have already reviewed this title.";

/// Errors specific to review and comment operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Title not found: {0}")]
    TitleNotFound(i32),

    #[error("Review not found: {0}")]
    ReviewNotFound(i32),

    #[error("Comment not found: {0}")]
    CommentNotFound(i32),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ReviewError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ReviewError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<FieldErrors> for ReviewError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

#[async_trait::async_trait]
pub trait ReviewService: Send + Sync {
    async fn list_reviews(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<ReviewRecord>, ReviewError>;

    async fn get_review(&self, title_id: i32, review_id: i32) -> Result<ReviewRecord, ReviewError>;

    /// Creates a review and refreshes the title rating.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Conflict`] if `author` already reviewed the title.
    async fn create_review(
        &self,
        title_id: i32,
        author: &CurrentUser,
        request: ReviewRequest,
    ) -> Result<ReviewRecord, ReviewError>;

    async fn update_review(
        &self,
        title_id: i32,
        review_id: i32,
        request: ReviewRequest,
    ) -> Result<ReviewRecord, ReviewError>;

    async fn delete_review(&self, title_id: i32, review_id: i32) -> Result<(), ReviewError>;

    async fn list_comments(
        &self,
        title_id: i32,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<CommentRecord>, ReviewError>;

    async fn get_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
    ) -> Result<CommentRecord, ReviewError>;

    async fn create_comment(
        &self,
        title_id: i32,
        review_id: i32,
        author: &CurrentUser,
        request: CommentRequest,
    ) -> Result<CommentRecord, ReviewError>;

    async fn update_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
        request: CommentRequest,
    ) -> Result<CommentRecord, ReviewError>;

    async fn delete_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
    ) -> Result<(), ReviewError>;
}
