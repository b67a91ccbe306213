//! Document service
//!
//! Listing, reading, authoring and exporting documents. Reads pass both the
//! classification gate and the status gate; writes go through the
//! create/edit/delete rules in `policy::access`.

use crate::db::repositories::DocumentRepository;
use crate::models::{
    parse_tags, ContentStatus, CreateDocumentInput, Document, DocumentClassification,
    DocumentFilter, DocumentHeader,
    DocumentWithAuthor, UpdateDocumentInput,
};
use crate::policy::{
    can_create_document, can_delete_document, can_edit_document, can_read_document,
    can_view_classification_label, can_view_status, ConfirmationFlow, ConfirmationTarget,
};
use crate::services::download::{self, DownloadFile, DownloadFormat};
use crate::services::email::{DocumentNotice, Notifier};
use crate::services::slug::document_slug;
use crate::services::Caller;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DocumentServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Outcome of an update; `new_slug` is set when the title change moved it
#[derive(Debug, Clone)]
pub struct UpdatedDocument {
    pub document: DocumentWithAuthor,
    pub new_slug: Option<String>,
}

pub struct DocumentService {
    repo: Arc<dyn DocumentRepository>,
    notifier: Arc<dyn Notifier>,
}

impl DocumentService {
    pub fn new(repo: Arc<dyn DocumentRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repo, notifier }
    }

    /// Documents matching `filter` that the caller may read
    pub async fn list(
        &self,
        caller: Caller<'_>,
        filter: &DocumentFilter,
    ) -> Result<Vec<DocumentWithAuthor>, DocumentServiceError> {
        let documents = self.repo.list(filter).await.context("Failed to list documents")?;
        Ok(documents
            .into_iter()
            .filter(|d| can_read_document(d.document.classification, d.document.status, caller.roles))
            .collect())
    }

    pub async fn get(
        &self,
        caller: Caller<'_>,
        slug: &str,
    ) -> Result<DocumentWithAuthor, DocumentServiceError> {
        let header = self.find_header(slug).await?;
        if !can_view_classification_label(&header.classification, caller.roles) {
            return Err(DocumentServiceError::Forbidden("Access denied".to_string()));
        }
        let document = self.find(slug).await?;
        if !can_view_status(document.document.status, caller.roles) {
            return Err(DocumentServiceError::Forbidden("Document not available".to_string()));
        }
        Ok(document)
    }

    pub async fn create(
        &self,
        caller: Caller<'_>,
        input: CreateDocumentInput,
    ) -> Result<DocumentWithAuthor, DocumentServiceError> {
        if !can_create_document(caller.roles) {
            return Err(DocumentServiceError::Forbidden("Official access required".to_string()));
        }
        require(&input.title, "Title is required")?;
        require(&input.content, "Content is required")?;

        let slug = document_slug(&input.title);
        if slug.is_empty() {
            return Err(DocumentServiceError::ValidationError(
                "Title must contain at least one Latin letter or digit".to_string(),
            ));
        }
        let taken = self
            .repo
            .slug_exists(&slug, None)
            .await
            .context("Failed to check slug")?;
        if taken {
            return Err(DocumentServiceError::ValidationError(
                "A document with this title already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let status = input.status.unwrap_or_default();
        let document = Document {
            id: 0,
            slug,
            title: input.title,
            description: input.description,
            content: input.content,
            category: input.category.unwrap_or_default(),
            classification: input.classification.unwrap_or_default(),
            status,
            version: input.version,
            effective_date: input.effective_date,
            tags: input.tags.unwrap_or_default(),
            author_id: caller.id,
            published_at: (status == ContentStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let document = self
            .repo
            .create(&document)
            .await
            .context("Failed to create document")?;

        tracing::info!("User {} created document {}", caller.id, document.slug);

        let created = DocumentWithAuthor {
            document,
            author_name: caller.display_name.to_string(),
        };
        if created.document.is_published() {
            self.announce(&created, true).await;
        }
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: Caller<'_>,
        slug: &str,
        input: UpdateDocumentInput,
    ) -> Result<UpdatedDocument, DocumentServiceError> {
        require(&input.title, "Title is required")?;
        require(&input.description, "Description is required")?;
        require(&input.content, "Content is required")?;

        let header = self.find_header(slug).await?;
        if header.classification.parse::<DocumentClassification>().is_err() {
            return Err(DocumentServiceError::Forbidden("Access denied".to_string()));
        }
        let existing = self.find(slug).await?;
        if !can_edit_document(existing.document.author_id, caller.roles, caller.id) {
            return Err(DocumentServiceError::Forbidden(
                "You can only edit your own documents".to_string(),
            ));
        }

        let mut document = existing.document;
        let was_published = document.is_published();

        if input.title != document.title {
            let mut candidate = document_slug(&input.title);
            let taken = candidate.is_empty()
                || self
                    .repo
                    .slug_exists(&candidate, Some(document.id))
                    .await
                    .context("Failed to check slug")?;
            if taken {
                candidate = format!("{}-{}", candidate, Utc::now().timestamp_millis())
                    .trim_start_matches('-')
                    .to_string();
            }
            document.slug = candidate;
        }

        document.title = input.title;
        document.description = Some(input.description);
        document.content = input.content;
        document.category = input.category;
        document.classification = input.classification;
        document.status = input.status;
        document.tags = input.tags.as_deref().map(parse_tags).unwrap_or_default();
        if let Some(version) = input.version.filter(|v| !v.is_empty()) {
            document.version = Some(version);
        }

        let now_published = document.is_published() && !was_published;
        if now_published && document.published_at.is_none() {
            document.published_at = Some(Utc::now());
        }

        let document = self
            .repo
            .update(&document)
            .await
            .context("Failed to update document")?;

        tracing::info!("User {} updated document {}", caller.id, document.slug);

        let new_slug = (document.slug != slug).then(|| document.slug.clone());
        let updated = DocumentWithAuthor {
            document,
            author_name: existing.author_name,
        };
        if now_published {
            self.announce(&updated, false).await;
        }

        Ok(UpdatedDocument {
            document: updated,
            new_slug,
        })
    }

    /// Delete a document after the caller typed its exact title
    pub async fn delete(
        &self,
        caller: Caller<'_>,
        slug: &str,
        title_confirmation: Option<&str>,
    ) -> Result<(), DocumentServiceError> {
        if !can_delete_document(caller.roles) {
            return Err(DocumentServiceError::Forbidden(
                "Only administrators can delete documents".to_string(),
            ));
        }

        let existing = self.find_header(slug).await?;

        let mut confirmation =
            ConfirmationFlow::new(ConfirmationTarget::DocumentTitle, &existing.title);
        confirmation.begin();
        confirmation
            .submit(title_confirmation)
            .map_err(|e| DocumentServiceError::ValidationError(e.to_string()))?;

        self.repo
            .delete(existing.id)
            .await
            .context("Failed to delete document")?;
        confirmation.complete();

        tracing::info!("User {} deleted document {}", caller.id, slug);
        Ok(())
    }

    /// Export a readable document as md, txt or a pdf payload
    pub async fn download(
        &self,
        caller: Caller<'_>,
        slug: &str,
        format: &str,
    ) -> Result<DownloadFile, DocumentServiceError> {
        let format: DownloadFormat = format
            .parse()
            .map_err(|e: download::InvalidFormat| DocumentServiceError::ValidationError(e.to_string()))?;

        let document = self.get(caller, slug).await?;
        let file = download::render(&document, format).context("Failed to render download")?;
        Ok(file)
    }

    async fn find(&self, slug: &str) -> Result<DocumentWithAuthor, DocumentServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get document")?
            .ok_or_else(|| DocumentServiceError::NotFound("Document not found".to_string()))
    }

    async fn find_header(&self, slug: &str) -> Result<DocumentHeader, DocumentServiceError> {
        self.repo
            .get_header_by_slug(slug)
            .await
            .context("Failed to get document")?
            .ok_or_else(|| DocumentServiceError::NotFound("Document not found".to_string()))
    }

    async fn announce(&self, document: &DocumentWithAuthor, is_new_document: bool) {
        let notice = DocumentNotice {
            title: document.document.title.clone(),
            slug: document.document.slug.clone(),
            category: document.document.category,
            author_name: document.author_name.clone(),
            author_id: document.document.author_id,
            is_new_document,
        };
        if let Err(e) = self.notifier.broadcast_document(notice).await {
            tracing::warn!(
                "Failed to send document notifications for {}: {:#}",
                document.document.slug,
                e
            );
        }
    }
}

fn require(value: &str, message: &str) -> Result<(), DocumentServiceError> {
    if value.trim().is_empty() {
        return Err(DocumentServiceError::ValidationError(message.to_string()));
    }
    Ok(())
}
