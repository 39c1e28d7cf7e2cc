use anyhow::Result;
use async_trait::async_trait;

use crate::db::{Paged, Store};

pub mod category;
pub mod comment;
pub mod genre;
pub mod review;
pub mod title;
pub mod token;
pub mod user;

/// A row of a slug-keyed catalog table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

/// Categories and genres: `{name, slug}` rows addressed by slug.
#[async_trait]
pub trait CatalogRepository: Send + Sync + Sized + 'static {
    /// Singular noun used in messages, e.g. `"category"`.
    const KIND: &'static str;

    fn from_store(store: &Store) -> Self;

    /// Ordered by id; `search` filters by name substring.
    async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<Paged<CatalogEntry>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>>;

    async fn create(&self, name: String, slug: String) -> Result<CatalogEntry>;

    async fn update(
        &self,
        existing: CatalogEntry,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<CatalogEntry>;

    /// Removes the row and detaches it from titles; `false` if the slug is unknown.
    async fn delete(&self, slug: &str) -> Result<bool>;
}
