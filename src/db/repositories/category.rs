use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use super::{CatalogEntry, CatalogRepository};
use crate::db::{Paged, Store};
use crate::entities::{categories, prelude::*, titles};

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

impl From<categories::Model> for CatalogEntry {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
        }
    }
}

#[async_trait]
impl CatalogRepository for CategoryRepository {
    const KIND: &'static str = "category";

    fn from_store(store: &Store) -> Self {
        store.categories()
    }

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<Paged<CatalogEntry>> {
        let mut query = Categories::find().order_by_asc(categories::Column::Id);

        if let Some(term) = search.filter(|s| !s.is_empty()) {
            query = query.filter(categories::Column::Name.contains(term));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items: items.into_iter().map(CatalogEntry::from).collect(),
            total,
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        let model = Categories::find()
            .filter(categories::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query category by slug")?;
        Ok(model.map(CatalogEntry::from))
    }

    async fn create(&self, name: String, slug: String) -> Result<CatalogEntry> {
        let model = categories::ActiveModel {
            name: Set(name),
            slug: Set(slug),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert category")?;
        Ok(model.into())
    }

    async fn update(
        &self,
        existing: CatalogEntry,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<CatalogEntry> {
        if name.is_none() && slug.is_none() {
            return Ok(existing);
        }

        let active = categories::ActiveModel {
            id: Unchanged(existing.id),
            name: name.map_or(Unchanged(existing.name), Set),
            slug: slug.map_or(Unchanged(existing.slug), Set),
        };

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update category")?;
        Ok(model.into())
    }

    /// Titles in the category stay and become uncategorised.
    async fn delete(&self, slug: &str) -> Result<bool> {
        let Some(category) = self.get_by_slug(slug).await? else {
            return Ok(false);
        };

        let txn = self.conn.begin().await?;

        let result = Categories::delete_by_id(category.id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        Titles::update_many()
            .col_expr(titles::Column::CategoryId, Expr::value(Option::<i32>::None))
            .filter(titles::Column::CategoryId.eq(category.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }
}
