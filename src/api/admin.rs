//! Administrator API endpoints
//!
//! - GET /api/v1/admin/users - Filtered user listing (search, role or `none`)
//! - PUT /api/v1/admin/users/{id}/roles - Replace a user's roles
//! - DELETE /api/v1/admin/users/{id} - Delete an account with typed email
//! - GET /api/v1/users - Accounts without a member profile (member linking)

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::documents::{lenient_body, parse_param};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Role, RoleSet, User, UserFilter};
use crate::services::DeletedUser;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserRequest {
    pub email_confirmation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RolesUpdatedResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserDeletedResponse {
    pub message: &'static str,
    pub deleted_user: DeletedUser,
}

/// Routes mounted under `/admin`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/roles", put(assign_roles))
        .route("/users/{id}", delete(delete_user))
}

/// Routes mounted under `/users`
pub fn users_router() -> Router<AppState> {
    Router::new().route("/", get(list_unlinked_users))
}

/// Parse a role list; every entry must be an exact role name
pub(crate) fn parse_roles(names: &[String]) -> Result<RoleSet, ApiError> {
    names
        .iter()
        .map(|name| {
            Role::from_wire(name)
                .ok_or_else(|| ApiError::validation_error(format!("Invalid role: {}", name)))
        })
        .collect()
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let filter = UserFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        role: parse_param(query.role.as_deref())?,
    };
    let users = state.admin_service.list_users(auth.caller(), &filter).await?;
    Ok(Json(users))
}

async fn list_unlinked_users(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.admin_service.list_unlinked_users(auth.caller()).await?;
    Ok(Json(users))
}

async fn assign_roles(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<RolesUpdatedResponse>, ApiError> {
    state.admin_service.authorize_role_assignment(auth.caller(), id)?;

    let request: AssignRolesRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::validation_error("Invalid request body"))?;
    let roles = parse_roles(&request.roles)?;
    let user = state
        .admin_service
        .assign_roles(auth.caller(), id, roles)
        .await?;
    Ok(Json(RolesUpdatedResponse {
        message: "User roles updated successfully",
        user,
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<UserDeletedResponse>, ApiError> {
    let request: DeleteUserRequest = lenient_body(&body);
    let deleted_user = state
        .admin_service
        .delete_user(auth.caller(), id, request.email_confirmation.as_deref())
        .await?;
    Ok(Json(UserDeletedResponse {
        message: "User deleted successfully",
        deleted_user,
    }))
}
