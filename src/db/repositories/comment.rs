use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::db::{Paged, now_timestamp};
use crate::entities::{comments, prelude::*, users};

#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub comment: comments::Model,
    pub author: String,
}

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_review(
        &self,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<CommentRecord>> {
        let paginator = Comments::find()
            .filter(comments::Column::ReviewId.eq(review_id))
            .order_by_desc(comments::Column::PubDate)
            .order_by_desc(comments::Column::Id)
            .paginate(&self.conn, page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items: self.attach_authors(items).await?,
            total,
        })
    }

    pub async fn get(&self, review_id: i32, comment_id: i32) -> Result<Option<CommentRecord>> {
        let Some(comment) = Comments::find_by_id(comment_id)
            .filter(comments::Column::ReviewId.eq(review_id))
            .one(&self.conn)
            .await
            .context("Failed to query comment")?
        else {
            return Ok(None);
        };

        Ok(self.attach_authors(vec![comment]).await?.pop())
    }

    async fn attach_authors(&self, items: Vec<comments::Model>) -> Result<Vec<CommentRecord>> {
        let authors: Vec<Option<users::Model>> = items.load_one(Users, &self.conn).await?;

        Ok(items
            .into_iter()
            .zip(authors)
            .map(|(comment, author)| CommentRecord {
                comment,
                author: author.map(|u| u.username).unwrap_or_default(),
            })
            .collect())
    }

    pub async fn create(&self, review_id: i32, author_id: i32, text: String) -> Result<CommentRecord> {
        let comment = comments::ActiveModel {
            author_id: Set(author_id),
            review_id: Set(review_id),
            text: Set(text),
            pub_date: Set(now_timestamp()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert comment")?;

        self.attach_authors(vec![comment])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Failed to load created comment"))
    }

    pub async fn update(
        &self,
        review_id: i32,
        comment_id: i32,
        text: String,
    ) -> Result<Option<CommentRecord>> {
        let Some(comment) = Comments::find_by_id(comment_id)
            .filter(comments::Column::ReviewId.eq(review_id))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let mut active: comments::ActiveModel = comment.into();
        active.text = Set(text);
        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update comment")?;

        Ok(self.attach_authors(vec![updated]).await?.pop())
    }

    pub async fn delete(&self, review_id: i32, comment_id: i32) -> Result<bool> {
        let result = Comments::delete_many()
            .filter(comments::Column::Id.eq(comment_id))
            .filter(comments::Column::ReviewId.eq(review_id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
