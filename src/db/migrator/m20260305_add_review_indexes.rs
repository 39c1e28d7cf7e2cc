use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        // One review per author and title.
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_author_title_unique ON reviews(author_id, title_id)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_reviews_title_pub_date ON reviews(title_id, pub_date)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_comments_review_pub_date ON comments(review_id, pub_date)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_titles_category ON titles(category_id)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_titles_category")
            .await?;
        conn.execute_unprepared("DROP INDEX IF EXISTS idx_comments_review_pub_date")
            .await?;
        conn.execute_unprepared("DROP INDEX IF EXISTS idx_reviews_title_pub_date")
            .await?;
        conn.execute_unprepared("DROP INDEX IF EXISTS idx_reviews_author_title_unique")
            .await?;

        Ok(())
    }
}
