use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::db::{Paged, is_unique_violation, now_timestamp};
use crate::entities::{comments, prelude::*, reviews, users};

use super::title::recompute_rating;

/// A review joined with its author's username.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub review: reviews::Model,
    pub author: String,
}

#[derive(Debug, Clone)]
pub enum CreateReviewOutcome {
    Created(ReviewRecord),
    /// The author already reviewed this title.
    Duplicate,
}

pub struct ReviewRepository {
    conn: DatabaseConnection,
}

impl ReviewRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Newest first.
    pub async fn list_for_title(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<ReviewRecord>> {
        let paginator = Reviews::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .order_by_desc(reviews::Column::PubDate)
            .order_by_desc(reviews::Column::Id)
            .paginate(&self.conn, page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items: self.attach_authors(items).await?,
            total,
        })
    }

    pub async fn get(&self, title_id: i32, review_id: i32) -> Result<Option<ReviewRecord>> {
        let Some(review) = Reviews::find_by_id(review_id)
            .filter(reviews::Column::TitleId.eq(title_id))
            .one(&self.conn)
            .await
            .context("Failed to query review")?
        else {
            return Ok(None);
        };

        Ok(self.attach_authors(vec![review]).await?.pop())
    }

    async fn attach_authors(&self, items: Vec<reviews::Model>) -> Result<Vec<ReviewRecord>> {
        let authors: Vec<Option<users::Model>> = items.load_one(Users, &self.conn).await?;

        Ok(items
            .into_iter()
            .zip(authors)
            .map(|(review, author)| ReviewRecord {
                review,
                author: author.map(|u| u.username).unwrap_or_default(),
            })
            .collect())
    }

    /// Inserts the review and refreshes the title rating in one transaction.
    ///
    /// The transaction writes before it reads so SQLite takes the write lock
    /// up front; a concurrent duplicate then fails on the unique index.
    pub async fn create(
        &self,
        title_id: i32,
        author_id: i32,
        text: String,
        score: i32,
    ) -> Result<CreateReviewOutcome> {
        let existing = Reviews::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .filter(reviews::Column::AuthorId.eq(author_id))
            .count(&self.conn)
            .await?;
        if existing > 0 {
            return Ok(CreateReviewOutcome::Duplicate);
        }

        let txn = self.conn.begin().await?;

        let inserted = reviews::ActiveModel {
            author_id: Set(author_id),
            title_id: Set(title_id),
            text: Set(text),
            score: Set(score),
            pub_date: Set(now_timestamp()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert review");

        let review = match inserted {
            Ok(review) => review,
            Err(e) if is_unique_violation(&e) => return Ok(CreateReviewOutcome::Duplicate),
            Err(e) => return Err(e),
        };

        recompute_rating(&txn, title_id).await?;
        txn.commit().await?;

        let record = self
            .attach_authors(vec![review])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Failed to load created review"))?;
        Ok(CreateReviewOutcome::Created(record))
    }

    pub async fn update(
        &self,
        title_id: i32,
        review_id: i32,
        text: Option<String>,
        score: Option<i32>,
    ) -> Result<Option<ReviewRecord>> {
        if text.is_none() && score.is_none() {
            return self.get(title_id, review_id).await;
        }

        let txn = self.conn.begin().await?;

        let mut update = Reviews::update_many()
            .filter(reviews::Column::Id.eq(review_id))
            .filter(reviews::Column::TitleId.eq(title_id));
        if let Some(text) = text {
            update = update.col_expr(reviews::Column::Text, Expr::value(text));
        }
        if let Some(score) = score {
            update = update.col_expr(reviews::Column::Score, Expr::value(score));
        }

        let result = update
            .exec(&txn)
            .await
            .context("Failed to update review")?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        if score.is_some() {
            recompute_rating(&txn, title_id).await?;
        }

        let updated = Reviews::find_by_id(review_id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Review vanished during update"))?;
        txn.commit().await?;

        Ok(self.attach_authors(vec![updated]).await?.pop())
    }

    /// Deletes a review and its comments, then refreshes the title rating.
    pub async fn delete(&self, title_id: i32, review_id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let result = Reviews::delete_many()
            .filter(reviews::Column::Id.eq(review_id))
            .filter(reviews::Column::TitleId.eq(title_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        Comments::delete_many()
            .filter(comments::Column::ReviewId.eq(review_id))
            .exec(&txn)
            .await?;

        recompute_rating(&txn, title_id).await?;
        txn.commit().await?;
        Ok(true)
    }
}
