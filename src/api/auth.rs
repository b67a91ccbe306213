//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account (pending approval)
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/logout - Sign out
//! - GET /api/v1/auth/me - Current account

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, Session, User};
use crate::policy::{lifecycle_state, LifecycleState};
use crate::services::LoginInput;

/// Cookie that clears the session on the client
pub const CLEAR_SESSION_COOKIE: &str = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub state: LifecycleState,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub state: LifecycleState,
}

/// `Set-Cookie` value for a freshly started session
pub fn session_cookie(session: &Session) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        session.max_age_seconds()
    )
}

pub(crate) fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie).map_err(ApiError::internal_error)?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/v1/auth/register
///
/// The account starts without roles; the caller is signed in so the client
/// can show the pending-approval screen.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body.email.clone();
    let password = body.password.clone();

    state
        .user_service
        .register(CreateUserInput {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;

    let (user, session) = sign_in(&state, email, password).await?;
    let headers = cookie_headers(&session_cookie(&session))?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            state: lifecycle_state(&user.roles),
            user,
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = sign_in(&state, body.email, body.password).await?;
    let headers = cookie_headers(&session_cookie(&session))?;

    Ok((
        headers,
        Json(AuthResponse {
            state: lifecycle_state(&user.roles),
            user,
            token: session.id,
        }),
    ))
}

pub(crate) async fn sign_in(
    state: &AppState,
    email: String,
    password: String,
) -> Result<(User, Session), ApiError> {
    let session = state
        .user_service
        .login(LoginInput { email, password })
        .await?;

    let user = state
        .user_service
        .validate_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session validation failed after login"))?;

    Ok((user, session))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&auth.session_id).await?;
    let headers = cookie_headers(CLEAR_SESSION_COOKIE)?;
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me
async fn me(auth: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        state: lifecycle_state(&auth.user.roles),
        user: auth.user,
    })
}
