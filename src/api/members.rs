//! Member directory API endpoints
//!
//! - GET /api/v1/members - List members (status, search)
//! - GET /api/v1/members/{slug} - Member profile
//! - POST /api/v1/members - Create (ADMIN)
//! - PUT /api/v1/members/{id} - Update (owner, MODERATOR, ADMIN)
//! - DELETE /api/v1/members/{id} - Delete with typed name (ADMIN)

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::documents::{lenient_body, parse_param, MessageResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::profile::parse_optional_date;
use crate::models::{
    CreateMemberInput, Member, MemberFilter, MemberStatus, MemberWithAccount, UpdateMemberInput,
};
use crate::services::slug::member_profile_path;

#[derive(Debug, Deserialize)]
pub struct ListMembersQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub bio: Option<String>,
    pub status: Option<MemberStatus>,
    pub mobile_numbers: Option<Vec<String>>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub name: String,
    pub status: MemberStatus,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub mobile_numbers: Option<Vec<String>>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteMemberRequest {
    pub name_confirmation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub message: &'static str,
    pub data: Member,
    /// Public profile path for the (possibly renamed) member
    pub profile_path: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        // Reads address members by slug, writes by id
        .route("/{key}", get(get_member).put(update_member).delete(delete_member))
}

async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<ListMembersQuery>,
) -> Result<Json<Vec<MemberWithAccount>>, ApiError> {
    let filter = MemberFilter {
        status: parse_param(query.status.as_deref())?,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let members = state.member_service.list(&filter).await?;
    Ok(Json(members))
}

async fn get_member(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MemberWithAccount>, ApiError> {
    let member = state.member_service.get_by_slug(&slug).await?;
    Ok(Json(member))
}

async fn create_member(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreateMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateMemberInput {
        date_of_birth: parse_optional_date(body.date_of_birth.as_deref(), "date of birth")?,
        name: body.name,
        email: body.email,
        place_of_birth: body.place_of_birth,
        bio: body.bio,
        status: body.status,
        mobile_numbers: body.mobile_numbers,
        instagram: body.instagram,
        github: body.github,
        facebook: body.facebook,
        x: body.x,
        linkedin: body.linkedin,
        title: body.title,
        organization: body.organization,
        user_id: body.user_id,
    };

    let member = state.member_service.create(auth.caller(), input).await?;
    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            message: "Member created successfully",
            profile_path: member_profile_path(&member.name),
            data: member,
        }),
    ))
}

async fn update_member(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let input = UpdateMemberInput {
        date_of_birth: parse_optional_date(body.date_of_birth.as_deref(), "date of birth")?,
        name: body.name,
        status: body.status,
        email: body.email,
        place_of_birth: body.place_of_birth,
        bio: body.bio,
        avatar_url: body.avatar_url,
        mobile_numbers: body.mobile_numbers,
        instagram: body.instagram,
        github: body.github,
        facebook: body.facebook,
        x: body.x,
        linkedin: body.linkedin,
        title: body.title,
        organization: body.organization,
    };

    let member = state.member_service.update(auth.caller(), id, input).await?;
    Ok(Json(MemberResponse {
        message: "Member updated successfully",
        profile_path: member_profile_path(&member.name),
        data: member,
    }))
}

async fn delete_member(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: DeleteMemberRequest = lenient_body(&body);
    state
        .member_service
        .delete(auth.caller(), id, request.name_confirmation.as_deref())
        .await?;
    Ok(Json(MessageResponse {
        message: "Member deleted successfully",
    }))
}
