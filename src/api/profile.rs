//! Self-service profile endpoints
//!
//! - GET /api/v1/profile - Account plus linked member profile
//! - PUT /api/v1/profile - Update name, email and linked member fields
//! - POST /api/v1/profile/password - Change password

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::MemberProfilePatch;
use crate::services::{ChangePasswordInput, PasswordChanged, Profile, UpdateProfileInput};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    /// `YYYY-MM-DD`; empty leaves the stored date unchanged
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub avatar_url: Option<String>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", post(change_password))
}

/// Parse an optional `YYYY-MM-DD` form value
pub(crate) fn parse_optional_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::validation_error(format!("Invalid {}", field))),
    }
}

async fn get_profile(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.user_service.profile(auth.user.id).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let date_of_birth = parse_optional_date(body.date_of_birth.as_deref(), "date of birth")?;
    let patch = MemberProfilePatch {
        bio: body.bio,
        date_of_birth,
        place_of_birth: body.place_of_birth,
        title: body.title,
        organization: body.organization,
        avatar_url: body.avatar_url,
        instagram: body.instagram,
        github: body.github,
        facebook: body.facebook,
        x: body.x,
        linkedin: body.linkedin,
    };

    let profile = state
        .user_service
        .update_profile(
            auth.user.id,
            UpdateProfileInput {
                name: body.name,
                email: body.email,
                member: Some(patch),
            },
        )
        .await?;
    Ok(Json(profile))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<PasswordChanged>, ApiError> {
    let changed = state
        .user_service
        .change_password(
            auth.user.id,
            &auth.session_id,
            ChangePasswordInput {
                current_password: body.current_password,
                new_password: body.new_password,
                confirm_password: body.confirm_password,
            },
        )
        .await?;
    Ok(Json(changed))
}
