//! `SeaORM` implementation of the `ReviewService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::api::types::{CommentRequest, ReviewRequest};
use crate::db::{CommentRecord, CreateReviewOutcome, Paged, ReviewRecord, Store};
use crate::domain::CurrentUser;
use crate::domain::validation::{FieldErrors, REQUIRED, validate_score, validate_text};
use crate::services::review_service::{DUPLICATE_REVIEW, ReviewError, ReviewService};

pub struct SeaOrmReviewService {
    store: Store,
}

impl SeaOrmReviewService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// On create every field is required; on update only present fields are checked.
    fn validate_review(request: &ReviewRequest, partial: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        match &request.text {
            Some(text) => errors.check("text", validate_text(text)),
            None if !partial => errors.add("text", REQUIRED),
            None => {}
        }

        match request.score {
            Some(score) => errors.check("score", validate_score(score)),
            None if !partial => errors.add("score", REQUIRED),
            None => {}
        }

        errors.into_result()
    }

    fn validate_comment(request: &CommentRequest) -> Result<String, FieldErrors> {
        let Some(text) = &request.text else {
            return Err(FieldErrors::single("text", REQUIRED));
        };
        validate_text(text).map_err(|msg| FieldErrors::single("text", msg))?;
        Ok(text.clone())
    }

    async fn ensure_title(&self, title_id: i32) -> Result<(), ReviewError> {
        if self.store.titles().exists(title_id).await? {
            Ok(())
        } else {
            Err(ReviewError::TitleNotFound(title_id))
        }
    }
}

#[async_trait]
impl ReviewService for SeaOrmReviewService {
    async fn list_reviews(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<ReviewRecord>, ReviewError> {
        self.ensure_title(title_id).await?;
        Ok(self
            .store
            .reviews()
            .list_for_title(title_id, page, page_size)
            .await?)
    }

    async fn get_review(&self, title_id: i32, review_id: i32) -> Result<ReviewRecord, ReviewError> {
        self.store
            .reviews()
            .get(title_id, review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))
    }

    async fn create_review(
        &self,
        title_id: i32,
        author: &CurrentUser,
        request: ReviewRequest,
    ) -> Result<ReviewRecord, ReviewError> {
        self.ensure_title(title_id).await?;
        Self::validate_review(&request, false)?;

        let text = request.text.unwrap_or_default();
        let score = request.score.unwrap_or_default();

        match self
            .store
            .reviews()
            .create(title_id, author.id, text, score)
            .await?
        {
            CreateReviewOutcome::Created(record) => {
                info!(
                    title_id,
                    review_id = record.review.id,
                    author = %author.username,
                    "Review created"
                );
                Ok(record)
            }
            CreateReviewOutcome::Duplicate => Err(ReviewError::Conflict(DUPLICATE_REVIEW.to_string())),
        }
    }

    async fn update_review(
        &self,
        title_id: i32,
        review_id: i32,
        request: ReviewRequest,
    ) -> Result<ReviewRecord, ReviewError> {
        Self::validate_review(&request, true)?;

        self.store
            .reviews()
            .update(title_id, review_id, request.text, request.score)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))
    }

    async fn delete_review(&self, title_id: i32, review_id: i32) -> Result<(), ReviewError> {
        if self.store.reviews().delete(title_id, review_id).await? {
            info!(title_id, review_id, "Review deleted");
            Ok(())
        } else {
            Err(ReviewError::ReviewNotFound(review_id))
        }
    }

    async fn list_comments(
        &self,
        title_id: i32,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<CommentRecord>, ReviewError> {
        self.get_review(title_id, review_id).await?;
        Ok(self
            .store
            .comments()
            .list_for_review(review_id, page, page_size)
            .await?)
    }

    async fn get_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
    ) -> Result<CommentRecord, ReviewError> {
        self.get_review(title_id, review_id).await?;
        self.store
            .comments()
            .get(review_id, comment_id)
            .await?
            .ok_or(ReviewError::CommentNotFound(comment_id))
    }

    async fn create_comment(
        &self,
        title_id: i32,
        review_id: i32,
        author: &CurrentUser,
        request: CommentRequest,
    ) -> Result<CommentRecord, ReviewError> {
        self.get_review(title_id, review_id).await?;
        let text = Self::validate_comment(&request)?;

        Ok(self
            .store
            .comments()
            .create(review_id, author.id, text)
            .await?)
    }

    async fn update_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
        request: CommentRequest,
    ) -> Result<CommentRecord, ReviewError> {
        let existing = self.get_comment(title_id, review_id, comment_id).await?;

        let text = match &request.text {
            Some(_) => Self::validate_comment(&request)?,
            None => return Ok(existing),
        };

        self.store
            .comments()
            .update(review_id, comment_id, text)
            .await?
            .ok_or(ReviewError::CommentNotFound(comment_id))
    }

    async fn delete_comment(
        &self,
        title_id: i32,
        review_id: i32,
        comment_id: i32,
    ) -> Result<(), ReviewError> {
        self.get_review(title_id, review_id).await?;
        if self.store.comments().delete(review_id, comment_id).await? {
            Ok(())
        } else {
            Err(ReviewError::CommentNotFound(comment_id))
        }
    }
}
