//! User repository
//!
//! - `UserRepository` trait defining account data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL
//!
//! Roles live in a single comma-separated column; an empty string is an
//! account awaiting approval.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{RoleSet, User, UserFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, name, email, password_hash, roles, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update name and email
    async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<User>;

    async fn update_roles(&self, id: i64, roles: &RoleSet) -> Result<User>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Delete a user; sessions and the linked member profile go with it.
    /// Returns false when no row matched.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered listing, newest first
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// Accounts without a member profile, ordered by name
    async fn list_unlinked(&self) -> Result<Vec<User>>;

    /// Accounts holding at least one role
    async fn list_approved(&self) -> Result<Vec<User>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(sqlite(&self.pool)?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(mysql(&self.pool)?, email).await,
        }
    }

    async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<User> {
        let user = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite(&self.pool)?;
                update_profile_sqlite(pool, id, name, email).await?;
                get_user_by_id_sqlite(pool, id).await?
            }
            DatabaseDriver::Mysql => {
                let pool = mysql(&self.pool)?;
                update_profile_mysql(pool, id, name, email).await?;
                get_user_by_id_mysql(pool, id).await?
            }
        };
        user.ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn update_roles(&self, id: i64, roles: &RoleSet) -> Result<User> {
        let roles = roles.to_string();
        let user = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite(&self.pool)?;
                update_column_sqlite(pool, id, "roles", &roles).await?;
                get_user_by_id_sqlite(pool, id).await?
            }
            DatabaseDriver::Mysql => {
                let pool = mysql(&self.pool)?;
                update_column_mysql(pool, id, "roles", &roles).await?;
                get_user_by_id_mysql(pool, id).await?
            }
        };
        user.ok_or_else(|| anyhow::anyhow!("User not found after role update"))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_column_sqlite(sqlite(&self.pool)?, id, "password_hash", password_hash).await
            }
            DatabaseDriver::Mysql => {
                update_column_mysql(mysql(&self.pool)?, id, "password_hash", password_hash).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(sqlite(&self.pool)?, filter).await?,
            DatabaseDriver::Mysql => list_users_mysql(mysql(&self.pool)?, filter).await?,
        };

        Ok(match filter.role {
            Some(role_filter) => users
                .into_iter()
                .filter(|u| role_filter.matches(&u.roles))
                .collect(),
            None => users,
        })
    }

    async fn list_unlinked(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             WHERE NOT EXISTS (SELECT 1 FROM members m WHERE m.user_id = u.id) \
             ORDER BY u.name ASC"
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_users_sqlite(sqlite(&self.pool)?, &sql).await,
            DatabaseDriver::Mysql => fetch_users_mysql(mysql(&self.pool)?, &sql).await,
        }
    }

    async fn list_approved(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE roles <> '' ORDER BY id ASC");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_users_sqlite(sqlite(&self.pool)?, &sql).await,
            DatabaseDriver::Mysql => fetch_users_mysql(mysql(&self.pool)?, &sql).await,
        }
    }
}

fn search_pattern(filter: &UserFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

fn parse_roles(raw: &str) -> Result<RoleSet> {
    RoleSet::from_str(raw).with_context(|| format!("Invalid stored roles: {raw}"))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, roles, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.roles.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_profile_sqlite(pool: &SqlitePool, id: i64, name: &str, email: &str) -> Result<()> {
    sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update user")?;
    Ok(())
}

// `column` is always one of our own literals
async fn update_column_sqlite(pool: &SqlitePool, id: i64, column: &str, value: &str) -> Result<()> {
    sqlx::query(&format!("UPDATE users SET {column} = ?, updated_at = ? WHERE id = ?"))
        .bind(value)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update user {column}"))?;
    Ok(())
}

async fn list_users_sqlite(pool: &SqlitePool, filter: &UserFilter) -> Result<Vec<User>> {
    let rows = match search_pattern(filter) {
        Some(pattern) => {
            sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE LOWER(name) LIKE ? OR LOWER(email) LIKE ? \
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn fetch_users_sqlite(pool: &SqlitePool, sql: &str) -> Result<Vec<User>> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;
    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let roles: String = row.get("roles");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        roles: parse_roles(&roles)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, roles, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.roles.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_profile_mysql(pool: &MySqlPool, id: i64, name: &str, email: &str) -> Result<()> {
    sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update user")?;
    Ok(())
}

async fn update_column_mysql(pool: &MySqlPool, id: i64, column: &str, value: &str) -> Result<()> {
    sqlx::query(&format!("UPDATE users SET {column} = ?, updated_at = ? WHERE id = ?"))
        .bind(value)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update user {column}"))?;
    Ok(())
}

async fn list_users_mysql(pool: &MySqlPool, filter: &UserFilter) -> Result<Vec<User>> {
    let rows = match search_pattern(filter) {
        Some(pattern) => {
            sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE LOWER(name) LIKE ? OR LOWER(email) LIKE ? \
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn fetch_users_mysql(pool: &MySqlPool, sql: &str) -> Result<Vec<User>> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;
    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let roles: String = row.get("roles");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        roles: parse_roles(&roles)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, RoleFilter};
    use crate::services::password::hash_password;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn test_user(name: &str, email: &str) -> User {
        User::new(name.to_string(), email.to_string(), "hash".to_string())
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&test_user("Leyla", "leyla@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert!(created.roles.is_empty());

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(found.email, "leyla@example.com");

        let by_email = repo
            .get_by_email("leyla@example.com")
            .await
            .expect("Failed to get user");
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&test_user("One", "dup@example.com")).await.unwrap();
        assert!(repo.create(&test_user("Two", "dup@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_roles_round_trips_through_storage() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&test_user("Rauf", "rauf@example.com")).await.unwrap();

        let roles = RoleSet::from([Role::Official, Role::Admin]);
        let updated = repo.update_roles(user.id, &roles).await.unwrap();
        assert_eq!(updated.roles, roles);

        let cleared = repo.update_roles(user.id, &RoleSet::empty()).await.unwrap();
        assert!(cleared.is_pending());
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&test_user("Old", "old@example.com")).await.unwrap();

        let updated = repo
            .update_profile(user.id, "New Name", "new@example.com")
            .await
            .unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.email, "new@example.com");

        let hash = hash_password("another_password").unwrap();
        repo.update_password(user.id, &hash).await.unwrap();
        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, hash);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&test_user("Gone", "gone@example.com")).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&test_user("Aysel Mammadova", "aysel@example.com")).await.unwrap();
        let b = repo.create(&test_user("Bahruz", "bahruz@portal.az")).await.unwrap();
        repo.create(&test_user("Cavid", "cavid@example.com")).await.unwrap();
        repo.update_roles(a.id, &RoleSet::from([Role::Admin])).await.unwrap();
        repo.update_roles(b.id, &RoleSet::from([Role::User])).await.unwrap();

        let all = repo.list(&UserFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Cavid");

        let search = repo
            .list(&UserFilter {
                search: Some("PORTAL".into()),
                role: None,
            })
            .await
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].id, b.id);

        let pending = repo
            .list(&UserFilter {
                search: None,
                role: Some(RoleFilter::NoRoles),
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "Cavid");

        let admins = repo
            .list(&UserFilter {
                search: None,
                role: Some(RoleFilter::Has(Role::Admin)),
            })
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);

        let approved = repo.list_approved().await.unwrap();
        assert_eq!(approved.len(), 2);
    }

    #[tokio::test]
    async fn test_list_unlinked_excludes_member_accounts() {
        let (pool, repo) = setup_test_repo().await;
        let zaur = repo.create(&test_user("Zaur", "zaur@example.com")).await.unwrap();
        repo.create(&test_user("Elvin", "elvin@example.com")).await.unwrap();
        repo.create(&test_user("Anar", "anar@example.com")).await.unwrap();

        sqlx::query("INSERT INTO members (slug, name, email, user_id) VALUES (?, ?, ?, ?)")
            .bind("zaur")
            .bind("Zaur")
            .bind("zaur@example.com")
            .bind(zaur.id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        let unlinked = repo.list_unlinked().await.unwrap();
        let names: Vec<&str> = unlinked.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Anar", "Elvin"]);
    }
}
