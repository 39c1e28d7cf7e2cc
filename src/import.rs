//! Bulk import of the CSV fixtures in `static/data`.
//!
//! Files are loaded in dependency order, each in its own transaction. Rows
//! keep their CSV `id`; rows that collide with existing data are skipped, as
//! are rows whose referenced title, review, author or genre is missing.

use anyhow::{Context, Result};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, EntityTrait, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{Store, format_timestamp, is_unique_violation, now_timestamp, parse_timestamp};
use crate::domain::Role;
use crate::domain::validation::validate_score;
use crate::entities::{
    categories, comments, genres, prelude::*, reviews, title_genres, titles, users,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvFile {
    Categories,
    Genres,
    Users,
    Titles,
    GenreTitles,
    Reviews,
    Comments,
}

impl CsvFile {
    /// Load order; later files reference rows from earlier ones.
    const ALL: [Self; 7] = [
        Self::Categories,
        Self::Genres,
        Self::Users,
        Self::Titles,
        Self::GenreTitles,
        Self::Reviews,
        Self::Comments,
    ];

    const fn file_name(self) -> &'static str {
        match self {
            Self::Categories => "category.csv",
            Self::Genres => "genre.csv",
            Self::Users => "users.csv",
            Self::Titles => "titles.csv",
            Self::GenreTitles => "genre_title.csv",
            Self::Reviews => "review.csv",
            Self::Comments => "comments.csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file: String,
    pub inserted: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub files: Vec<FileReport>,
    pub ratings_recomputed: u64,
}

impl ImportReport {
    #[must_use]
    pub fn get(&self, file: &str) -> Option<&FileReport> {
        self.files.iter().find(|r| r.file == file)
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.files {
            writeln!(
                f,
                "{:<16} inserted {:>6}  skipped {:>6}",
                report.file, report.inserted, report.skipped
            )?;
        }
        write!(f, "ratings recomputed for {} titles", self.ratings_recomputed)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: i32,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    id: i32,
    name: String,
    year: i32,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GenreTitleRow {
    title_id: i32,
    genre_id: i32,
}

#[derive(Debug, Deserialize)]
struct ReviewRow {
    id: i32,
    title_id: i32,
    text: String,
    author: i32,
    score: i32,
    #[serde(default)]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentRow {
    id: i32,
    review_id: i32,
    text: String,
    author: i32,
    #[serde(default)]
    pub_date: Option<String>,
}

/// Imports every known CSV file present in `dir`.
pub async fn import_dir(store: &Store, dir: &Path) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for kind in CsvFile::ALL {
        let file = kind.file_name();
        let path = dir.join(file);
        if !path.exists() {
            info!(file, "CSV file not found, skipping");
            continue;
        }

        let txn = store.conn.begin().await?;
        let (inserted, skipped) = match kind {
            CsvFile::Categories => import_categories(&txn, &path).await?,
            CsvFile::Genres => import_genres(&txn, &path).await?,
            CsvFile::Users => import_users(&txn, &path).await?,
            CsvFile::Titles => import_titles(&txn, &path).await?,
            CsvFile::GenreTitles => import_genre_titles(&txn, &path).await?,
            CsvFile::Reviews => import_reviews(&txn, &path).await?,
            CsvFile::Comments => import_comments(&txn, &path).await?,
        };
        txn.commit().await?;

        info!(file, inserted, skipped, "CSV file imported");
        report.files.push(FileReport {
            file: file.to_string(),
            inserted,
            skipped,
        });
    }

    report.ratings_recomputed = store.titles().recompute_all_ratings().await?;
    Ok(report)
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<(Vec<T>, u64)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    let mut malformed = 0;
    for (line, record) in reader.deserialize::<T>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(file = %path.display(), line = line + 2, error = %e, "Skipping malformed row");
                malformed += 1;
            }
        }
    }

    Ok((rows, malformed))
}

async fn ids<E, C>(conn: &C, column: E::Column) -> Result<HashSet<i32>>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let ids: Vec<i32> = E::find()
        .select_only()
        .column(column)
        .into_tuple::<i32>()
        .all(conn)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Runs one insert; a constraint collision counts as skipped.
async fn try_insert<F>(insert: F) -> Result<bool>
where
    F: Future<Output = std::result::Result<u64, sea_orm::DbErr>>,
{
    match insert.await {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = anyhow::Error::new(e);
            if is_unique_violation(&err) {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

fn pub_date(value: Option<&str>) -> String {
    value
        .and_then(parse_timestamp)
        .map_or_else(now_timestamp, format_timestamp)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn import_categories(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<CatalogRow>(path)?;
    let mut inserted = 0;

    for row in rows {
        let model = categories::ActiveModel {
            id: Set(row.id),
            name: Set(row.name),
            slug: Set(row.slug),
        };
        if try_insert(Categories::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_genres(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<CatalogRow>(path)?;
    let mut inserted = 0;

    for row in rows {
        let model = genres::ActiveModel {
            id: Set(row.id),
            name: Set(row.name),
            slug: Set(row.slug),
        };
        if try_insert(Genres::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_users(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<UserRow>(path)?;
    let mut inserted = 0;
    let now = now_timestamp();

    for row in rows {
        let role: Role = row
            .role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default();

        let model = users::ActiveModel {
            id: Set(row.id),
            username: Set(row.username),
            email: Set(row.email),
            first_name: Set(blank_to_none(row.first_name)),
            last_name: Set(blank_to_none(row.last_name)),
            bio: Set(blank_to_none(row.bio)),
            role: Set(role.as_str().to_string()),
            is_superuser: Set(false),
            confirmation_code_hash: Set(None),
            confirmation_code_expires_at: Set(None),
            date_joined: Set(now.clone()),
            updated_at: Set(now.clone()),
        };
        if try_insert(Users::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_titles(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<TitleRow>(path)?;
    let category_ids = ids::<Categories, _>(txn, categories::Column::Id).await?;
    let mut inserted = 0;

    for row in rows {
        let category_id = row.category.filter(|id| category_ids.contains(id));
        if row.category.is_some() && category_id.is_none() {
            warn!(title_id = row.id, "Unknown category, importing title uncategorised");
        }

        let model = titles::ActiveModel {
            id: Set(row.id),
            name: Set(row.name),
            year: Set(row.year),
            description: Set(blank_to_none(row.description)),
            category_id: Set(category_id),
            rating: Set(None),
        };
        if try_insert(Titles::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_genre_titles(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<GenreTitleRow>(path)?;
    let title_ids = ids::<Titles, _>(txn, titles::Column::Id).await?;
    let genre_ids = ids::<Genres, _>(txn, genres::Column::Id).await?;
    let mut inserted = 0;

    for row in rows {
        if !title_ids.contains(&row.title_id) || !genre_ids.contains(&row.genre_id) {
            warn!(title_id = row.title_id, genre_id = row.genre_id, "Unresolved genre link");
            skipped += 1;
            continue;
        }

        let model = title_genres::ActiveModel {
            title_id: Set(row.title_id),
            genre_id: Set(row.genre_id),
        };
        if try_insert(TitleGenres::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_reviews(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<ReviewRow>(path)?;
    let title_ids = ids::<Titles, _>(txn, titles::Column::Id).await?;
    let user_ids = ids::<Users, _>(txn, users::Column::Id).await?;
    let mut inserted = 0;

    for row in rows {
        if !title_ids.contains(&row.title_id) || !user_ids.contains(&row.author) {
            warn!(review_id = row.id, "Unresolved title or author, skipping review");
            skipped += 1;
            continue;
        }

        if let Err(e) = validate_score(row.score) {
            warn!(review_id = row.id, error = %e, "Skipping review");
            skipped += 1;
            continue;
        }

        let model = reviews::ActiveModel {
            id: Set(row.id),
            author_id: Set(row.author),
            title_id: Set(row.title_id),
            text: Set(row.text),
            score: Set(row.score),
            pub_date: Set(pub_date(row.pub_date.as_deref())),
        };
        if try_insert(Reviews::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

async fn import_comments(txn: &DatabaseTransaction, path: &Path) -> Result<(u64, u64)> {
    let (rows, mut skipped) = read_rows::<CommentRow>(path)?;
    let review_ids = ids::<Reviews, _>(txn, reviews::Column::Id).await?;
    let user_ids = ids::<Users, _>(txn, users::Column::Id).await?;
    let mut inserted = 0;

    for row in rows {
        if !review_ids.contains(&row.review_id) || !user_ids.contains(&row.author) {
            warn!(comment_id = row.id, "Unresolved review or author, skipping comment");
            skipped += 1;
            continue;
        }

        let model = comments::ActiveModel {
            id: Set(row.id),
            author_id: Set(row.author),
            review_id: Set(row.review_id),
            text: Set(row.text),
            pub_date: Set(pub_date(row.pub_date.as_deref())),
        };
        if try_insert(Comments::insert(model).exec_without_returning(txn)).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    Ok((inserted, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pub_date_normalises_or_defaults() {
        assert_eq!(
            pub_date(Some("2019-09-24T21:08:21.567Z")),
            "2019-09-24T21:08:21.567000Z"
        );
        let fallback = pub_date(Some("garbage"));
        assert!(parse_timestamp(&fallback).is_some());
    }

    #[test]
    fn test_read_rows_skips_malformed_lines() {
        let dir = std::env::temp_dir().join(format!("yamdb_csv_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("titles.csv");
        std::fs::write(
            &path,
            "id,name,year,category\n1,Shawshank,1994,1\n2,Broken,notayear,1\n3,Uncategorised,2001,\n",
        )
        .unwrap();

        let (rows, malformed) = read_rows::<TitleRow>(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(malformed, 1);
        assert_eq!(rows[0].category, Some(1));
        assert_eq!(rows[1].category, None);

        let _ = std::fs::remove_dir_all(dir);
    }
}
