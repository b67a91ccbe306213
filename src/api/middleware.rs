//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token validation)
//! - The approval gate (pending accounts are limited to `/auth` and `/profile`)
//!
//! Also owns the shared [`AppState`] and the [`ApiError`] envelope every
//! handler returns.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PortalConfig;
use crate::models::User;
use crate::policy::api_access_allowed;
use crate::services::{
    AdminService, AdminServiceError, Caller, DocumentService, DocumentServiceError, MemberService,
    MemberServiceError, UserService, UserServiceError,
};
use crate::web::PageRenderer;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub admin_service: Arc<AdminService>,
    pub document_service: Arc<DocumentService>,
    pub member_service: Arc<MemberService>,
    pub pages: Arc<PageRenderer>,
    pub portal: Arc<PortalConfig>,
}

/// Authenticated user extracted from request, with the session it came from
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub session_id: String,
}

impl AuthenticatedUser {
    pub fn caller(&self) -> Caller<'_> {
        Caller::from(&self.user)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::Conflict(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AdminServiceError> for ApiError {
    fn from(e: AdminServiceError) -> Self {
        match e {
            AdminServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            AdminServiceError::NotFound(msg) => ApiError::not_found(msg),
            AdminServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AdminServiceError::OwnsContent { ref summary, ref details } => ApiError::with_details(
                "VALIDATION_ERROR",
                e.to_string(),
                serde_json::json!({
                    "content_summary": summary,
                    "content_details": details,
                }),
            ),
            AdminServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<DocumentServiceError> for ApiError {
    fn from(e: DocumentServiceError) -> Self {
        match e {
            DocumentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            DocumentServiceError::NotFound(msg) => ApiError::not_found(msg),
            DocumentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            DocumentServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<MemberServiceError> for ApiError {
    fn from(e: MemberServiceError) -> Self {
        match e {
            MemberServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            MemberServiceError::NotFound(msg) => ApiError::not_found(msg),
            MemberServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            MemberServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

/// Extract session token from request headers
pub(crate) fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Resolve the session carried by `headers`, if any
pub(crate) async fn resolve_session(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<Option<AuthenticatedUser>, UserServiceError> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let user = state.user_service.validate_session(&token).await?;
    Ok(user.map(|user| AuthenticatedUser {
        user,
        session_id: token,
    }))
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if extract_session_token(request.headers()).is_none() {
        return Err(ApiError::unauthorized("Missing authentication token"));
    }

    let authenticated = resolve_session(&state, request.headers())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(authenticated);
    Ok(next.run(request).await)
}

/// Approval gate: accounts without any role only reach `/auth` and `/profile`.
///
/// Must run after [`require_auth`].
pub async fn require_approved(request: Request, next: Next) -> Result<Response, ApiError> {
    let authenticated = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !api_access_allowed(&authenticated.user.roles) {
        return Err(ApiError::forbidden("Account pending approval"));
    }

    Ok(next.run(request).await)
}
