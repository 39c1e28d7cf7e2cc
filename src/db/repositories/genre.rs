use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::{CatalogEntry, CatalogRepository};
use crate::db::{Paged, Store};
use crate::entities::{genres, prelude::*, title_genres};

pub struct GenreRepository {
    conn: DatabaseConnection,
}

impl GenreRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Resolves every slug, returning the ones that do not exist as `Err`.
    pub async fn resolve_slugs(
        &self,
        slugs: &[String],
    ) -> Result<std::result::Result<Vec<genres::Model>, Vec<String>>> {
        let found = Genres::find()
            .filter(genres::Column::Slug.is_in(slugs.iter().cloned()))
            .order_by_asc(genres::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to resolve genre slugs")?;

        let missing: Vec<String> = slugs
            .iter()
            .filter(|slug| !found.iter().any(|g| &g.slug == *slug))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(Ok(found))
        } else {
            Ok(Err(missing))
        }
    }
}

impl From<genres::Model> for CatalogEntry {
    fn from(model: genres::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
        }
    }
}

#[async_trait]
impl CatalogRepository for GenreRepository {
    const KIND: &'static str = "genre";

    fn from_store(store: &Store) -> Self {
        store.genres()
    }

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<Paged<CatalogEntry>> {
        let mut query = Genres::find().order_by_asc(genres::Column::Id);

        if let Some(term) = search.filter(|s| !s.is_empty()) {
            query = query.filter(genres::Column::Name.contains(term));
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
        let model = Genres::find()
            .filter(genres::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query genre by slug")?;
        Ok(model.map(CatalogEntry::from))
    }

    async fn create(&self, name: String, slug: String) -> Result<CatalogEntry> {
        let model = genres::ActiveModel {
            name: Set(name),
            slug: Set(slug),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert genre")?;
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

        let active = genres::ActiveModel {
            id: Unchanged(existing.id),
            name: name.map_or(Unchanged(existing.name), Set),
            slug: slug.map_or(Unchanged(existing.slug), Set),
        };

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update genre")?;
        Ok(model.into())
    }

    /// Titles lose the genre link but are otherwise kept.
    async fn delete(&self, slug: &str) -> Result<bool> {
        let Some(genre) = self.get_by_slug(slug).await? else {
            return Ok(false);
        };

        let txn = self.conn.begin().await?;

        let result = Genres::delete_by_id(genre.id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        TitleGenres::delete_many()
            .filter(title_genres::Column::GenreId.eq(genre.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }
}
