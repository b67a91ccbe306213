//! Document API endpoints
//!
//! - GET /api/v1/documents - List readable documents (status, category, search)
//! - GET /api/v1/documents/{slug} - Read one document
//! - GET /api/v1/documents/{slug}/download?format=md|txt|pdf - Export
//! - POST /api/v1/documents - Create (OFFICIAL)
//! - PUT /api/v1/documents/{slug} - Update (author or ADMIN)
//! - DELETE /api/v1/documents/{slug} - Delete with typed title (ADMIN)

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    ContentStatus, CreateDocumentInput, DocumentCategory, DocumentClassification, DocumentFilter,
    DocumentWithAuthor, UpdateDocumentInput,
};

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub category: Option<DocumentCategory>,
    pub classification: Option<DocumentClassification>,
    pub status: Option<ContentStatus>,
    pub version: Option<String>,
    pub effective_date: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: DocumentCategory,
    pub classification: DocumentClassification,
    pub status: ContentStatus,
    /// Comma-separated
    pub tags: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteDocumentRequest {
    pub title_confirmation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateDocumentResponse {
    pub message: &'static str,
    pub data: DocumentWithAuthor,
    /// Present when the title change moved the document to a new slug
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents).post(create_document))
        .route(
            "/{slug}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/{slug}/download", get(download_document))
}

/// Parse an optional query value into an enum, rejecting unknown labels
pub(crate) fn parse_param<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = anyhow::Error>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| T::from_str(v).map_err(|e| ApiError::validation_error(e.to_string())))
        .transpose()
}

/// Deserialize an optional JSON body; an empty or malformed body yields the default
pub(crate) fn lenient_body<T: Default + for<'de> Deserialize<'de>>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

async fn list_documents(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<Vec<DocumentWithAuthor>>, ApiError> {
    let filter = DocumentFilter {
        status: parse_param(query.status.as_deref())?,
        category: parse_param(query.category.as_deref())?,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let documents = state.document_service.list(auth.caller(), &filter).await?;
    Ok(Json(documents))
}

async fn get_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<DocumentWithAuthor>, ApiError> {
    let document = state.document_service.get(auth.caller(), &slug).await?;
    Ok(Json(document))
}

async fn download_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(slug): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = query.format.unwrap_or_else(|| "md".to_string());
    let file = state
        .document_service
        .download(auth.caller(), &slug, &format)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(file.content_type));
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(ApiError::internal_error)?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok((headers, file.body))
}

async fn create_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let effective_date =
        crate::api::profile::parse_optional_date(body.effective_date.as_deref(), "effective date")?;
    let input = CreateDocumentInput {
        title: body.title,
        description: body.description,
        content: body.content,
        category: body.category,
        classification: body.classification,
        status: body.status,
        version: body.version.filter(|v| !v.is_empty()),
        effective_date,
        tags: body.tags,
    };

    let document = state.document_service.create(auth.caller(), input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn update_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Json<UpdateDocumentResponse>, ApiError> {
    let input = UpdateDocumentInput {
        title: body.title,
        description: body.description,
        content: body.content,
        category: body.category,
        classification: body.classification,
        status: body.status,
        tags: body.tags,
        version: body.version,
    };

    let updated = state
        .document_service
        .update(auth.caller(), &slug, input)
        .await?;
    Ok(Json(UpdateDocumentResponse {
        message: "Document updated successfully",
        data: updated.document,
        new_slug: updated.new_slug,
    }))
}

async fn delete_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: DeleteDocumentRequest = lenient_body(&body);
    state
        .document_service
        .delete(auth.caller(), &slug, request.title_confirmation.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully",
    }))
}
