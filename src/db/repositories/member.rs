//! Member repository
//!
//! Every read joins the linked account so callers learn whether the profile
//! belongs to an administrator without a second query.

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::{Member, MemberFilter, MemberStatus, MemberWithAccount, Role, RoleSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::str::FromStr;
use std::sync::Arc;

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.slug, m.name, m.email, m.date_of_birth, m.place_of_birth, m.bio,
           m.status, m.mobile_numbers, m.avatar_url, m.instagram, m.github, m.facebook,
           m.x, m.linkedin, m.title, m.organization, m.user_id, m.created_at, m.updated_at,
           u.roles AS account_roles
    FROM members m
    LEFT JOIN users u ON u.id = m.user_id
"#;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: &Member) -> Result<Member>;

    async fn get_by_id(&self, id: i64) -> Result<Option<MemberWithAccount>>;

    /// Oldest member whose slug matches
    async fn get_by_slug(&self, slug: &str) -> Result<Option<MemberWithAccount>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Member>>;

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<Member>>;

    /// Persist every mutable field of `member`
    async fn update(&self, member: &Member) -> Result<Member>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered listing ordered by name
    async fn list(&self, filter: &MemberFilter) -> Result<Vec<MemberWithAccount>>;
}

pub struct SqlxMemberRepository {
    pool: DynDatabasePool,
}

impl SqlxMemberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MemberRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        key: Key<'_>,
    ) -> Result<Option<MemberWithAccount>> {
        let sql = format!("{MEMBER_SELECT} WHERE {clause} ORDER BY m.id ASC LIMIT 1");
        let found = run_on_driver!(self.pool, |exec| {
            let query = sqlx::query(&sql);
            let query = match key {
                Key::Int(v) => query.bind(v),
                Key::Text(v) => query.bind(v),
            };
            query
                .fetch_optional(exec)
                .await
                .with_context(|| format!("Failed to get member where {clause}"))?
                .as_ref()
                .map(row_to_member)
                .transpose()
        });
        found
    }
}

/// Lookup value for a single-column member query
#[derive(Clone, Copy)]
enum Key<'a> {
    Int(i64),
    Text(&'a str),
}

#[async_trait]
impl MemberRepository for SqlxMemberRepository {
    async fn create(&self, member: &Member) -> Result<Member> {
        let now = Utc::now();
        let mobile_numbers = serde_json::to_string(&member.mobile_numbers)
            .context("Failed to encode mobile numbers")?;

        const SQL: &str = r#"
            INSERT INTO members (slug, name, email, date_of_birth, place_of_birth, bio, status,
                mobile_numbers, avatar_url, instagram, github, facebook, x, linkedin, title,
                organization, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let id = run_on_driver!(self.pool, |exec| {
            let result = sqlx::query(SQL)
                .bind(&member.slug)
                .bind(&member.name)
                .bind(&member.email)
                .bind(member.date_of_birth)
                .bind(&member.place_of_birth)
                .bind(&member.bio)
                .bind(member.status.as_str())
                .bind(&mobile_numbers)
                .bind(&member.avatar_url)
                .bind(&member.instagram)
                .bind(&member.github)
                .bind(&member.facebook)
                .bind(&member.x)
                .bind(&member.linkedin)
                .bind(&member.title)
                .bind(&member.organization)
                .bind(member.user_id)
                .bind(now)
                .bind(now)
                .execute(exec)
                .await
                .context("Failed to create member")?;
            result.inserted_id()
        });

        Ok(Member {
            id,
            created_at: now,
            updated_at: now,
            ..member.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MemberWithAccount>> {
        self.fetch_one_where("m.id = ?", Key::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<MemberWithAccount>> {
        self.fetch_one_where("m.slug = ?", Key::Text(slug)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Member>> {
        Ok(self
            .fetch_one_where("m.email = ?", Key::Text(email))
            .await?
            .map(|m| m.member))
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<Member>> {
        Ok(self
            .fetch_one_where("m.user_id = ?", Key::Int(user_id))
            .await?
            .map(|m| m.member))
    }

    async fn update(&self, member: &Member) -> Result<Member> {
        let now = Utc::now();
        let mobile_numbers = serde_json::to_string(&member.mobile_numbers)
            .context("Failed to encode mobile numbers")?;

        const SQL: &str = r#"
            UPDATE members
            SET slug = ?, name = ?, email = ?, date_of_birth = ?, place_of_birth = ?, bio = ?,
                status = ?, mobile_numbers = ?, avatar_url = ?, instagram = ?, github = ?,
                facebook = ?, x = ?, linkedin = ?, title = ?, organization = ?, updated_at = ?
            WHERE id = ?
        "#;

        run_on_driver!(self.pool, |exec| {
            sqlx::query(SQL)
                .bind(&member.slug)
                .bind(&member.name)
                .bind(&member.email)
                .bind(member.date_of_birth)
                .bind(&member.place_of_birth)
                .bind(&member.bio)
                .bind(member.status.as_str())
                .bind(&mobile_numbers)
                .bind(&member.avatar_url)
                .bind(&member.instagram)
                .bind(&member.github)
                .bind(&member.facebook)
                .bind(&member.x)
                .bind(&member.linkedin)
                .bind(&member.title)
                .bind(&member.organization)
                .bind(now)
                .bind(member.id)
                .execute(exec)
                .await
                .context("Failed to update member")?;
        });

        Ok(Member {
            updated_at: now,
            ..member.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM members WHERE id = ?")
                .bind(id)
                .execute(exec)
                .await
                .context("Failed to delete member")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, filter: &MemberFilter) -> Result<Vec<MemberWithAccount>> {
        let sql = format!(
            r#"{MEMBER_SELECT}
            WHERE (? IS NULL OR m.status = ?)
              AND (? IS NULL
                   OR LOWER(m.name) LIKE ?
                   OR LOWER(COALESCE(m.title, '')) LIKE ?
                   OR LOWER(COALESCE(m.organization, '')) LIKE ?
                   OR LOWER(m.email) LIKE ?)
            ORDER BY m.name ASC, m.id ASC"#
        );
        let status = filter.status.map(|s| s.as_str().to_string());
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let members = run_on_driver!(self.pool, |exec| {
            sqlx::query(&sql)
                .bind(&status)
                .bind(&status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(exec)
                .await
                .context("Failed to list members")?
                .iter()
                .map(row_to_member)
                .collect::<Result<Vec<_>>>()
        });
        members
    }
}

fn row_to_member<'r, R>(row: &'r R) -> Result<MemberWithAccount>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDate: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let status: String = row.get("status");
    let mobile_numbers: String = row.get("mobile_numbers");
    let account_roles: Option<String> = row.get("account_roles");

    let linked_account_is_admin = match account_roles {
        Some(raw) => RoleSet::from_str(&raw)
            .with_context(|| format!("Invalid stored roles: {raw}"))?
            .contains(Role::Admin),
        None => false,
    };

    let member = Member {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        email: row.get("email"),
        date_of_birth: row.get("date_of_birth"),
        place_of_birth: row.get("place_of_birth"),
        bio: row.get("bio"),
        status: MemberStatus::from_str(&status)
            .with_context(|| format!("Invalid stored member status: {status}"))?,
        mobile_numbers: serde_json::from_str(&mobile_numbers)
            .context("Invalid stored mobile numbers")?,
        avatar_url: row.get("avatar_url"),
        instagram: row.get("instagram"),
        github: row.get("github"),
        facebook: row.get("facebook"),
        x: row.get("x"),
        linkedin: row.get("linkedin"),
        title: row.get("title"),
        organization: row.get("organization"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };

    Ok(MemberWithAccount {
        member,
        linked_account_is_admin,
    })
}
