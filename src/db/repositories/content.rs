//! Authored-content ownership lookups
//!
//! Used before deleting an account: documents, articles and news items keep
//! their author and block the deletion.

use crate::db::DynDatabasePool;
use crate::models::OwnedContent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Titles of everything `user_id` authored, oldest first per kind
    async fn owned_by(&self, user_id: i64) -> Result<OwnedContent>;
}

pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn titles(&self, table: &str, user_id: i64) -> Result<Vec<String>> {
        // `table` is one of our own literals
        let sql = format!("SELECT title FROM {table} WHERE author_id = ? ORDER BY id ASC");
        let titles = run_on_driver!(self.pool, |exec| {
            sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(exec)
                .await
                .with_context(|| format!("Failed to list {table} by author"))?
                .iter()
                .map(|row| row.get::<String, _>("title"))
                .collect::<Vec<_>>()
        });
        Ok(titles)
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn owned_by(&self, user_id: i64) -> Result<OwnedContent> {
        Ok(OwnedContent {
            documents: self.titles("documents", user_id).await?,
            articles: self.titles("articles", user_id).await?,
            news: self.titles("news", user_id).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_owned_content_per_kind() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite_pool = pool.as_sqlite().unwrap();

        let mut ids = Vec::new();
        for email in ["writer@example.com", "reader@example.com"] {
            let id = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
                .bind("Someone")
                .bind(email)
                .bind("hash")
                .execute(sqlite_pool)
                .await
                .unwrap()
                .last_insert_rowid();
            ids.push(id);
        }
        let (writer, reader) = (ids[0], ids[1]);

        sqlx::query("INSERT INTO documents (slug, title, content, author_id) VALUES (?, ?, ?, ?)")
            .bind("statute")
            .bind("Statute")
            .bind("body")
            .bind(writer)
            .execute(sqlite_pool)
            .await
            .unwrap();
        for (table, title) in [("articles", "Op-ed"), ("news", "Weekly digest"), ("news", "Flash")] {
            sqlx::query(&format!("INSERT INTO {table} (title, author_id) VALUES (?, ?)"))
                .bind(title)
                .bind(writer)
                .execute(sqlite_pool)
                .await
                .unwrap();
        }

        let repo = SqlxContentRepository::new(pool.clone());

        let owned = repo.owned_by(writer).await.unwrap();
        assert_eq!(owned.documents, vec!["Statute".to_string()]);
        assert_eq!(owned.articles, vec!["Op-ed".to_string()]);
        assert_eq!(owned.news, vec!["Weekly digest".to_string(), "Flash".to_string()]);
        assert_eq!(owned.summary().total(), 4);

        assert!(repo.owned_by(reader).await.unwrap().is_empty());
    }
}
