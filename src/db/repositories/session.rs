//! Session repository
//!
//! Sessions are opaque server-side tokens; the cookie or bearer header only
//! carries the id.

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Look a session up by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete every session of a user except `keep`
    async fn delete_others(&self, user_id: i64, keep: &str) -> Result<u64>;

    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        run_on_driver!(self.pool, |exec| {
            sqlx::query(
                "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .bind(session.created_at)
            .execute(exec)
            .await
            .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        const SQL: &str = "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";

        let session = run_on_driver!(self.pool, |exec| {
            sqlx::query(SQL)
                .bind(id)
                .fetch_optional(exec)
                .await
                .context("Failed to get session by ID")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                })
        });
        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(exec)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_others(&self, user_id: i64, keep: &str) -> Result<u64> {
        let affected = run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ? AND id <> ?")
                .bind(user_id)
                .bind(keep)
                .execute(exec)
                .await
                .context("Failed to delete other sessions")?
                .rows_affected()
        });
        Ok(affected)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let affected = run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(exec)
                .await
                .context("Failed to delete sessions by user")?
                .rows_affected()
        });
        Ok(affected)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let affected = run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(exec)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected()
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    // Sessions reference users
    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        sqlx::query("INSERT INTO users (id, name, email, password_hash) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(format!("User {}", id))
            .bind(format!("user{}@example.com", id))
            .bind("hash")
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test user");
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let session = Session::start(1, 7);
        repo.create(&session).await.expect("Failed to create session");

        let found = repo
            .get_by_id(&session.id)
            .await
            .expect("Failed to get session")
            .expect("Session not found");
        assert_eq!(found.user_id, 1);
        assert!(!found.is_expired());

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let session = Session::start(1, 7);
        repo.create(&session).await.unwrap();
        repo.delete(&session.id).await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_others_keeps_current_session() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let current = Session::start(1, 7);
        let other = Session::start(1, 7);
        let foreign = Session::start(2, 7);
        for s in [&current, &other, &foreign] {
            repo.create(s).await.unwrap();
        }

        assert_eq!(repo.delete_others(1, &current.id).await.unwrap(), 1);
        assert!(repo.get_by_id(&current.id).await.unwrap().is_some());
        assert!(repo.get_by_id(&other.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&foreign.id).await.unwrap().is_some());

        assert_eq!(repo.delete_by_user(1).await.unwrap(), 1);
        assert!(repo.get_by_id(&current.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let mut expired = Session::start(1, 7);
        expired.expires_at = Utc::now() - Duration::days(1);
        let valid = Session::start(1, 7);

        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }
}
