//! Document repository
//!
//! Classification, status and category are stored as their uppercase labels.
//! A row whose labels no longer parse is never handed out by a listing.

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::{
    ContentStatus, Document, DocumentCategory, DocumentClassification, DocumentFilter,
    DocumentHeader, DocumentWithAuthor,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::str::FromStr;
use std::sync::Arc;

const DOCUMENT_SELECT: &str = r#"
    SELECT d.id, d.slug, d.title, d.description, d.content, d.category, d.classification,
           d.status, d.version, d.effective_date, d.tags, d.author_id, d.published_at,
           d.created_at, d.updated_at, u.name AS author_name
    FROM documents d
    JOIN users u ON u.id = d.author_id
"#;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: &Document) -> Result<Document>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<DocumentWithAuthor>>;

    /// Id, title and raw classification label, readable even when the labels don't parse
    async fn get_header_by_slug(&self, slug: &str) -> Result<Option<DocumentHeader>>;

    /// Whether `slug` is taken by a document other than `excluding`
    async fn slug_exists(&self, slug: &str, excluding: Option<i64>) -> Result<bool>;

    /// Persist every mutable field of `document`
    async fn update(&self, document: &Document) -> Result<Document>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered listing, most recently updated first
    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<DocumentWithAuthor>>;
}

pub struct SqlxDocumentRepository {
    pool: DynDatabasePool,
}

impl SqlxDocumentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocumentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DocumentRepository for SqlxDocumentRepository {
    async fn create(&self, document: &Document) -> Result<Document> {
        let now = Utc::now();
        let tags = serde_json::to_string(&document.tags).context("Failed to encode tags")?;

        const SQL: &str = r#"
            INSERT INTO documents (slug, title, description, content, category, classification,
                status, version, effective_date, tags, author_id, published_at, created_at,
                updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let id = run_on_driver!(self.pool, |exec| {
            sqlx::query(SQL)
                .bind(&document.slug)
                .bind(&document.title)
                .bind(&document.description)
                .bind(&document.content)
                .bind(document.category.as_str())
                .bind(document.classification.as_str())
                .bind(document.status.as_str())
                .bind(&document.version)
                .bind(document.effective_date)
                .bind(&tags)
                .bind(document.author_id)
                .bind(document.published_at)
                .bind(now)
                .bind(now)
                .execute(exec)
                .await
                .context("Failed to create document")?
                .inserted_id()
        });

        Ok(Document {
            id,
            created_at: now,
            updated_at: now,
            ..document.clone()
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<DocumentWithAuthor>> {
        let sql = format!("{DOCUMENT_SELECT} WHERE d.slug = ?");
        let found = run_on_driver!(self.pool, |exec| {
            sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(exec)
                .await
                .context("Failed to get document by slug")?
                .as_ref()
                .map(row_to_document)
                .transpose()
        });
        found
    }

    async fn get_header_by_slug(&self, slug: &str) -> Result<Option<DocumentHeader>> {
        let header = run_on_driver!(self.pool, |exec| {
            sqlx::query("SELECT id, title, classification FROM documents WHERE slug = ?")
                .bind(slug)
                .fetch_optional(exec)
                .await
                .context("Failed to get document header")?
                .map(|row| DocumentHeader {
                    id: row.get("id"),
                    title: row.get("title"),
                    classification: row.get("classification"),
                })
        });
        Ok(header)
    }

    async fn slug_exists(&self, slug: &str, excluding: Option<i64>) -> Result<bool> {
        let count: i64 = run_on_driver!(self.pool, |exec| {
            sqlx::query(
                "SELECT COUNT(*) AS count FROM documents WHERE slug = ? AND (? IS NULL OR id <> ?)",
            )
            .bind(slug)
            .bind(excluding)
            .bind(excluding)
            .fetch_one(exec)
            .await
            .context("Failed to check document slug")?
            .get("count")
        });
        Ok(count > 0)
    }

    async fn update(&self, document: &Document) -> Result<Document> {
        let now = Utc::now();
        let tags = serde_json::to_string(&document.tags).context("Failed to encode tags")?;

        const SQL: &str = r#"
            UPDATE documents
            SET slug = ?, title = ?, description = ?, content = ?, category = ?,
                classification = ?, status = ?, version = ?, effective_date = ?, tags = ?,
                published_at = ?, updated_at = ?
            WHERE id = ?
        "#;

        run_on_driver!(self.pool, |exec| {
            sqlx::query(SQL)
                .bind(&document.slug)
                .bind(&document.title)
                .bind(&document.description)
                .bind(&document.content)
                .bind(document.category.as_str())
                .bind(document.classification.as_str())
                .bind(document.status.as_str())
                .bind(&document.version)
                .bind(document.effective_date)
                .bind(&tags)
                .bind(document.published_at)
                .bind(now)
                .bind(document.id)
                .execute(exec)
                .await
                .context("Failed to update document")?;
        });

        Ok(Document {
            updated_at: now,
            ..document.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = run_on_driver!(self.pool, |exec| {
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(id)
                .execute(exec)
                .await
                .context("Failed to delete document")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<DocumentWithAuthor>> {
        let sql = format!(
            r#"{DOCUMENT_SELECT}
            WHERE (? IS NULL OR d.status = ?)
              AND (? IS NULL OR d.category = ?)
              AND (? IS NULL
                   OR LOWER(d.title) LIKE ?
                   OR LOWER(COALESCE(d.description, '')) LIKE ?)
            ORDER BY d.updated_at DESC, d.id DESC"#
        );
        let status = filter.status.map(|s| s.as_str());
        let category = filter.category.map(|c| c.as_str());
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let documents = run_on_driver!(self.pool, |exec| {
            sqlx::query(&sql)
                .bind(status)
                .bind(status)
                .bind(category)
                .bind(category)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(exec)
                .await
                .context("Failed to list documents")?
                .iter()
                .filter_map(|row| match row_to_document(row) {
                    Ok(document) => Some(document),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable document row: {:#}", e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        });
        Ok(documents)
    }
}

fn row_to_document<'r, R>(row: &'r R) -> Result<DocumentWithAuthor>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDate: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let category: String = row.get("category");
    let classification: String = row.get("classification");
    let status: String = row.get("status");
    let tags: String = row.get("tags");

    let document = Document {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        category: DocumentCategory::from_str(&category)
            .with_context(|| format!("Invalid stored category: {category}"))?,
        classification: DocumentClassification::from_str(&classification)
            .with_context(|| format!("Invalid stored classification: {classification}"))?,
        status: ContentStatus::from_str(&status)
            .with_context(|| format!("Invalid stored status: {status}"))?,
        version: row.get("version"),
        effective_date: row.get("effective_date"),
        tags: serde_json::from_str(&tags).context("Invalid stored tags")?,
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };

    Ok(DocumentWithAuthor {
        document,
        author_name: row.get("author_name"),
    })
}
