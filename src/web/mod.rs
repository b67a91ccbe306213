//! Server-rendered pages
//!
//! Every page request passes through [`page_gate`], which resolves the
//! session cookie and applies the account lifecycle routing rules before a
//! handler runs.

pub mod templates;

pub use templates::PageRenderer;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::auth::{cookie_headers, session_cookie, sign_in, CLEAR_SESSION_COOKIE};
use crate::api::middleware::{resolve_session, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, RoleFilter, User, UserFilter};
use crate::policy::{lifecycle_state, route_decision, LifecycleState, Surface};

/// Session resolved by [`page_gate`], `None` for anonymous visitors
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

impl CurrentUser {
    fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|auth| &auth.user)
    }
}

/// Rendering or lookup failure on a page
pub struct PageError(anyhow::Error);

impl<E> From<E> for PageError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!("Page error: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

type PageResult<T = Html<String>> = Result<T, PageError>;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub role: String,
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login_submit))
        .route("/register", get(register_page).post(register_submit))
        .route("/pending-approval", get(pending_page))
        .route("/logout", post(logout))
        .route("/admin/users", get(admin_users))
        .route_layer(middleware::from_fn_with_state(state, page_gate))
}

/// Lifecycle gate for pages: redirects with 303 when the caller may not see
/// the requested surface.
pub async fn page_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let authenticated = match resolve_session(&state, request.headers()).await {
        Ok(authenticated) => authenticated,
        Err(e) => return PageError::from(e).into_response(),
    };

    let surface = Surface::from_path(request.uri().path());
    let decision = route_decision(authenticated.as_ref().map(|auth| &auth.user.roles), surface);
    if let Some(location) = decision.location() {
        tracing::debug!("Redirecting {} to {}", request.uri().path(), location);
        return Redirect::to(location).into_response();
    }

    request.extensions_mut().insert(CurrentUser(authenticated));
    next.run(request).await
}

fn render(
    state: &AppState,
    template: &str,
    current: &CurrentUser,
    context: &TeraContext,
) -> PageResult {
    let html = state
        .pages
        .render(template, &state.portal.site_name, current.user(), context)?;
    Ok(Html(html))
}

/// Where a freshly signed-in account lands
fn landing_path(user: &User) -> &'static str {
    match lifecycle_state(&user.roles) {
        LifecycleState::Pending => "/pending-approval",
        _ => "/",
    }
}

async fn home(State(state): State<AppState>, Extension(current): Extension<CurrentUser>) -> PageResult {
    render(&state, "home.html", &current, &TeraContext::new())
}

async fn login_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> PageResult {
    render(&state, "login.html", &current, &TeraContext::new())
}

async fn login_submit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<LoginForm>,
) -> PageResult<Response> {
    let email = form.email.clone();
    match sign_in(&state, form.email, form.password).await {
        Ok((user, session)) => {
            let headers = cookie_headers(&session_cookie(&session))
                .map_err(|e| anyhow::anyhow!(e.error.message))?;
            Ok((headers, Redirect::to(landing_path(&user))).into_response())
        }
        Err(e) if e.status().is_server_error() => Err(anyhow::anyhow!(e.error.message).into()),
        Err(e) => {
            let mut context = TeraContext::new();
            context.insert("error", &e.error.message);
            context.insert("email", &email);
            let page = render(&state, "login.html", &current, &context)?;
            Ok((e.status(), page).into_response())
        }
    }
}

async fn register_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> PageResult {
    render(&state, "register.html", &current, &TeraContext::new())
}

async fn register_submit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<RegisterForm>,
) -> PageResult<Response> {
    let registered = state
        .user_service
        .register(CreateUserInput {
            name: form.name.clone(),
            email: form.email.clone(),
            password: form.password.clone(),
        })
        .await;

    if let Err(e) = registered {
        let e = crate::api::ApiError::from(e);
        if e.status().is_server_error() {
            return Err(anyhow::anyhow!(e.error.message).into());
        }
        let mut context = TeraContext::new();
        context.insert("error", &e.error.message);
        context.insert("name", &form.name);
        context.insert("email", &form.email);
        let page = render(&state, "register.html", &current, &context)?;
        return Ok((e.status(), page).into_response());
    }

    let (user, session) = sign_in(&state, form.email, form.password)
        .await
        .map_err(|e| anyhow::anyhow!(e.error.message))?;
    let headers = cookie_headers(&session_cookie(&session))
        .map_err(|e| anyhow::anyhow!(e.error.message))?;
    Ok((headers, Redirect::to(landing_path(&user))).into_response())
}

async fn pending_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> PageResult {
    render(&state, "pending.html", &current, &TeraContext::new())
}

async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> PageResult<Response> {
    if let Some(auth) = &current.0 {
        state.user_service.logout(&auth.session_id).await?;
    }
    let headers = cookie_headers(CLEAR_SESSION_COOKIE).map_err(|e| anyhow::anyhow!(e.error.message))?;
    Ok((headers, Redirect::to("/login")).into_response())
}

async fn admin_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<UserListQuery>,
) -> PageResult<Response> {
    let Some(auth) = &current.0 else {
        return Ok(Redirect::to("/login").into_response());
    };

    let search = query.search.trim();
    let filter = UserFilter {
        search: (!search.is_empty()).then(|| search.to_string()),
        role: match query.role.trim() {
            "" => None,
            label => label.parse::<RoleFilter>().ok(),
        },
    };
    let users = state.admin_service.list_users(auth.caller(), &filter).await?;

    let mut context = TeraContext::new();
    context.insert("users", &users);
    context.insert("search", search);
    context.insert("role", query.role.trim());
    Ok(render(&state, "admin_users.html", &current, &context)?.into_response())
}

#[cfg(test)]
mod tests {
    use crate::models::{Role, RoleSet};
    use crate::test_support::{read_body, TestApp, TEST_PASSWORD};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;

    fn page(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[tokio::test]
    async fn test_anonymous_home_redirects_to_login() {
        let app = TestApp::new().await;
        let response = app.send(page("/", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_anonymous_sees_login_page() {
        let app = TestApp::new().await;
        let response = app.send(page("/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_body(response).await.contains("name=\"password\""));
    }

    #[tokio::test]
    async fn test_pending_account_is_held_at_pending_page() {
        let app = TestApp::new().await;
        let (_, session) = app.account("pending@example.com", RoleSet::empty()).await;

        let response = app.send(page("/", Some(&session.id))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/pending-approval");

        let response = app.send(page("/login", Some(&session.id))).await;
        assert_eq!(location(&response), "/pending-approval");

        let response = app.send(page("/pending-approval", Some(&session.id))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_active_account_cannot_open_user_management() {
        let app = TestApp::new().await;
        let (_, session) = app
            .account("editor@example.com", RoleSet::from([Role::Editor]))
            .await;

        let response = app.send(page("/admin/users", Some(&session.id))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = app.send(page("/pending-approval", Some(&session.id))).await;
        assert_eq!(location(&response), "/");

        let response = app.send(page("/", Some(&session.id))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_sees_user_management() {
        let app = TestApp::new().await;
        let (_, session) = app
            .account("admin@example.com", RoleSet::from([Role::Admin]))
            .await;
        app.account("waiting@example.com", RoleSet::empty()).await;

        let response = app
            .send(page("/admin/users?role=none", Some(&session.id)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = read_body(response).await;
        assert!(html.contains("waiting@example.com"));
        assert!(!html.contains("admin@example.com</td>"));
    }

    #[tokio::test]
    async fn test_login_form_sets_cookie_and_redirects() {
        let app = TestApp::new().await;
        app.account("member@example.com", RoleSet::from([Role::User]))
            .await;

        let response = app
            .send(form(
                "/login",
                &format!("email=member%40example.com&password={}", TEST_PASSWORD),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert!(cookie.starts_with("session="));
    }

    #[tokio::test]
    async fn test_login_form_rerenders_with_error() {
        let app = TestApp::new().await;
        let response = app
            .send(form("/login", "email=nobody%40example.com&password=wrongpass"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(read_body(response).await.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_register_form_lands_on_pending_page() {
        let app = TestApp::new().await;
        let response = app
            .send(form(
                "/register",
                "name=Nigar+Aliyeva&email=nigar%40example.com&password=password123",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/pending-approval");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let app = TestApp::new().await;
        let (_, session) = app
            .account("out@example.com", RoleSet::from([Role::User]))
            .await;

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, format!("session={}", session.id))
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");

        let response = app.send(page("/", Some(&session.id))).await;
        assert_eq!(location(&response), "/login");
    }
}
