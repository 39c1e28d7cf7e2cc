use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    LoaderTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Query,
};

use crate::db::Paged;
use crate::entities::{
    categories, comments, genres, prelude::*, reviews, title_genres, titles,
};

/// A title with its category and genres loaded.
#[derive(Debug, Clone)]
pub struct TitleRecord {
    pub title: titles::Model,
    pub category: Option<categories::Model>,
    pub genres: Vec<genres::Model>,
}

/// Title list filters. Category and genre match on slug.
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub genre_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<i32>>,
    pub genre_ids: Option<Vec<i32>>,
}

pub struct TitleRepository {
    conn: DatabaseConnection,
}

impl TitleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        filter: &TitleFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<TitleRecord>> {
        let mut query = Titles::find().order_by_asc(titles::Column::Id);

        if let Some(slug) = &filter.category {
            query = query.filter(
                titles::Column::CategoryId.in_subquery(
                    Query::select()
                        .column(categories::Column::Id)
                        .from(Categories)
                        .and_where(categories::Column::Slug.eq(slug.as_str()))
                        .to_owned(),
                ),
            );
        }

        if let Some(slug) = &filter.genre {
            query = query.filter(
                titles::Column::Id.in_subquery(
                    Query::select()
                        .column(title_genres::Column::TitleId)
                        .from(TitleGenres)
                        .and_where(
                            title_genres::Column::GenreId.in_subquery(
                                Query::select()
                                    .column(genres::Column::Id)
                                    .from(Genres)
                                    .and_where(genres::Column::Slug.eq(slug.as_str()))
                                    .to_owned(),
                            ),
                        )
                        .to_owned(),
                ),
            );
        }

        if let Some(name) = &filter.name {
            query = query.filter(titles::Column::Name.eq(name.as_str()));
        }

        if let Some(year) = filter.year {
            query = query.filter(titles::Column::Year.eq(year));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items: self.attach_relations(items).await?,
            total,
        })
    }

    pub async fn get(&self, id: i32) -> Result<Option<TitleRecord>> {
        let Some(title) = Titles::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query title")?
        else {
            return Ok(None);
        };

        Ok(self.attach_relations(vec![title]).await?.pop())
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        Ok(Titles::find_by_id(id).count(&self.conn).await? > 0)
    }

    async fn attach_relations(&self, items: Vec<titles::Model>) -> Result<Vec<TitleRecord>> {
        let categories = items.load_one(Categories, &self.conn).await?;
        let genres = items
            .load_many_to_many(Genres, TitleGenres, &self.conn)
            .await?;

        Ok(items
            .into_iter()
            .zip(categories)
            .zip(genres)
            .map(|((title, category), mut genres)| {
                genres.sort_by_key(|g| g.id);
                TitleRecord {
                    title,
                    category,
                    genres,
                }
            })
            .collect())
    }

    pub async fn create(&self, new_title: NewTitle) -> Result<TitleRecord> {
        let txn = self.conn.begin().await?;

        let title = titles::ActiveModel {
            name: Set(new_title.name),
            year: Set(new_title.year),
            description: Set(new_title.description),
            category_id: Set(new_title.category_id),
            rating: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert title")?;

        link_genres(&txn, title.id, &new_title.genre_ids).await?;

        txn.commit().await?;

        self.get(title.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created title"))
    }

    pub async fn update(&self, id: i32, changes: TitleChanges) -> Result<Option<TitleRecord>> {
        let Some(title) = Titles::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let txn = self.conn.begin().await?;

        let mut active: titles::ActiveModel = title.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(year) = changes.year {
            active.year = Set(year);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        if active.is_changed() {
            match active.update(&txn).await {
                Ok(_) => {}
                Err(DbErr::RecordNotUpdated) => return Ok(None),
                Err(e) => return Err(anyhow::Error::new(e).context("Failed to update title")),
            }
        }

        if let Some(genre_ids) = changes.genre_ids {
            TitleGenres::delete_many()
                .filter(title_genres::Column::TitleId.eq(id))
                .exec(&txn)
                .await?;
            link_genres(&txn, id, &genre_ids).await?;
        }

        txn.commit().await?;
        self.get(id).await
    }

    /// Deletes a title together with its reviews and their comments.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let result = Titles::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        let review_ids: Vec<i32> = Reviews::find()
            .select_only()
            .column(reviews::Column::Id)
            .filter(reviews::Column::TitleId.eq(id))
            .into_tuple::<i32>()
            .all(&txn)
            .await?;

        Comments::delete_many()
            .filter(comments::Column::ReviewId.is_in(review_ids))
            .exec(&txn)
            .await?;

        Reviews::delete_many()
            .filter(reviews::Column::TitleId.eq(id))
            .exec(&txn)
            .await?;

        TitleGenres::delete_many()
            .filter(title_genres::Column::TitleId.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }

    /// Recomputes the rating of every title, e.g. after a bulk import.
    pub async fn recompute_all_ratings(&self) -> Result<u64> {
        let result = Titles::update_many()
            .col_expr(
                titles::Column::Rating,
                sea_orm::sea_query::Expr::cust(
                    "(SELECT AVG(reviews.score) FROM reviews WHERE reviews.title_id = titles.id)",
                ),
            )
            .exec(&self.conn)
            .await
            .context("Failed to recompute ratings")?;

        Ok(result.rows_affected)
    }
}

async fn link_genres<C: ConnectionTrait>(conn: &C, title_id: i32, genre_ids: &[i32]) -> Result<()> {
    if genre_ids.is_empty() {
        return Ok(());
    }

    let mut unique = genre_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let links: Vec<title_genres::ActiveModel> = unique
        .into_iter()
        .map(|genre_id| title_genres::ActiveModel {
            title_id: Set(title_id),
            genre_id: Set(genre_id),
        })
        .collect();

    TitleGenres::insert_many(links)
        .exec(conn)
        .await
        .context("Failed to link genres")?;

    Ok(())
}

/// Mean of the scores, `None` when there are none.
#[must_use]
pub fn mean_score(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: i64 = scores.iter().map(|&s| i64::from(s)).sum();
    #[allow(clippy::cast_precision_loss)]
    Some(sum as f64 / scores.len() as f64)
}

/// Stores the mean review score on the title. Runs on the caller's
/// connection so it can share the transaction of the review write.
pub async fn recompute_rating<C: ConnectionTrait>(conn: &C, title_id: i32) -> Result<Option<f64>> {
    let scores: Vec<i32> = Reviews::find()
        .select_only()
        .column(reviews::Column::Score)
        .filter(reviews::Column::TitleId.eq(title_id))
        .into_tuple::<i32>()
        .all(conn)
        .await
        .context("Failed to load review scores")?;

    let rating = mean_score(&scores);

    Titles::update_many()
        .col_expr(
            titles::Column::Rating,
            sea_orm::sea_query::Expr::value(rating),
        )
        .filter(titles::Column::Id.eq(title_id))
        .exec(conn)
        .await?;

    Ok(rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[]), None);
        assert_eq!(mean_score(&[7]), Some(7.0));
        assert_eq!(mean_score(&[1, 10]), Some(5.5));
        assert_eq!(mean_score(&[3, 4, 4]), Some(11.0 / 3.0));
    }
}
