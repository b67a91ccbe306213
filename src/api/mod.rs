//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth (register, login, logout, me) and the self-service profile
//! - Documents with export
//! - Member directory
//! - User administration
//!
//! Every route except register/login requires a session. Everything outside
//! `/auth` and `/profile` additionally requires an approved account.

pub mod admin;
pub mod auth;
pub mod documents;
pub mod members;
pub mod middleware;
pub mod profile;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Approved accounts only
    let approved_routes = Router::new()
        .nest("/documents", documents::router())
        .nest("/members", members::router())
        .nest("/users", admin::users_router())
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_approved))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in account, pending included
    let session_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profile", profile::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .merge(session_routes)
        .merge(approved_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(crate::web::router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use crate::models::{Role, RoleSet, User};
    use crate::test_support::{read_json, TestApp};
    use axum::http::{header, StatusCode};

    /// Create an account with `roles` and return its bearer token
    async fn token_for(app: &TestApp, email: &str, roles: RoleSet) -> (User, String) {
        let (user, session) = app.account(email, roles).await;
        (user, session.id)
    }

    #[tokio::test]
    async fn test_register_creates_pending_account_with_cookie() {
        let app = TestApp::new().await;
        let register = serde_json::json!({
            "name": "Nigar",
            "email": "nigar@example.com",
            "password": "password123"
        });
        let response = app
            .send_json("POST", "/api/v1/auth/register", None, Some(register.clone()))
            .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));

        let body = read_json(response).await;
        assert_eq!(body["state"], "pending");
        assert_eq!(body["user"]["roles"], serde_json::json!([]));
        assert!(body["user"].get("password_hash").is_none());

        let duplicate = app
            .send_json("POST", "/api/v1/auth/register", None, Some(register))
            .await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_failure_is_generic() {
        let app = TestApp::new().await;
        token_for(&app, "user@example.com", RoleSet::from([Role::User])).await;

        let ok = app
            .send_json(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({"email": "user@example.com", "password": "password123"})),
            )
            .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(read_json(ok).await["state"], "active");

        let response = app
            .send_json(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({"email": "user@example.com", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"]["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthorized() {
        let app = TestApp::new().await;
        let response = app.send_json("GET", "/api/v1/documents", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .send_json("GET", "/api/v1/auth/me", Some("not-a-session"), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_pending_account_is_gated() {
        let app = TestApp::new().await;
        let (_, token) = token_for(&app, "pending@example.com", RoleSet::empty()).await;

        let me = app.send_json("GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(read_json(me).await["state"], "pending");

        let profile = app.send_json("GET", "/api/v1/profile", Some(&token), None).await;
        assert_eq!(profile.status(), StatusCode::OK);

        for uri in ["/api/v1/documents", "/api/v1/members", "/api/v1/admin/users"] {
            let response = app.send_json("GET", uri, Some(&token), None).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_document_lifecycle_over_http() {
        let app = TestApp::new().await;
        let (_, official) = token_for(&app, "official@example.com", RoleSet::from([Role::Official])).await;
        let (_, admin) = token_for(&app, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let (_, reader) = token_for(&app, "reader@example.com", RoleSet::from([Role::User])).await;

        let created = app
            .send_json(
                "POST",
                "/api/v1/documents",
                Some(&official),
                Some(serde_json::json!({
                    "title": "Budget Law",
                    "content": "# Budget\n\n**Article 1**",
                    "category": "LAW",
                    "status": "PUBLISHED",
                    "tags": ["budget"]
                })),
            )
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = read_json(created).await;
        assert_eq!(body["slug"], "budget-law");
        assert_eq!(body["classification"], "PUBLIC");

        let denied = app
            .send_json(
                "POST",
                "/api/v1/documents",
                Some(&reader),
                Some(serde_json::json!({"title": "X", "content": "Y"})),
            )
            .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let listed = app
            .send_json("GET", "/api/v1/documents?category=law", Some(&reader), None)
            .await;
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(read_json(listed).await.as_array().unwrap().len(), 1);

        let bad_filter = app
            .send_json("GET", "/api/v1/documents?status=DELETED", Some(&reader), None)
            .await;
        assert_eq!(bad_filter.status(), StatusCode::BAD_REQUEST);

        let download = app
            .send_json(
                "GET",
                "/api/v1/documents/budget-law/download?format=txt",
                Some(&reader),
                None,
            )
            .await;
        assert_eq!(download.status(), StatusCode::OK);
        assert_eq!(
            download.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"budget-law.txt\""
        );
        assert_eq!(download.headers()[header::CACHE_CONTROL], "no-cache");

        let bad_format = app
            .send_json(
                "GET",
                "/api/v1/documents/budget-law/download?format=docx",
                Some(&reader),
                None,
            )
            .await;
        assert_eq!(bad_format.status(), StatusCode::BAD_REQUEST);

        let no_confirmation = app
            .send_json("DELETE", "/api/v1/documents/budget-law", Some(&admin), None)
            .await;
        assert_eq!(no_confirmation.status(), StatusCode::BAD_REQUEST);

        let deleted = app
            .send_json(
                "DELETE",
                "/api/v1/documents/budget-law",
                Some(&admin),
                Some(serde_json::json!({"title_confirmation": "Budget Law"})),
            )
            .await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let gone = app
            .send_json("GET", "/api/v1/documents/budget-law", Some(&reader), None)
            .await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_member_routes() {
        let app = TestApp::new().await;
        let (_, admin) = token_for(&app, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let (_, reader) = token_for(&app, "reader@example.com", RoleSet::from([Role::User])).await;

        let created = app
            .send_json(
                "POST",
                "/api/v1/members",
                Some(&admin),
                Some(serde_json::json!({
                    "name": "Rəşad Əliyev",
                    "email": "rashad@example.com",
                    "date_of_birth": "1990-05-01"
                })),
            )
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = read_json(created).await;
        let id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["status"], "ACTIVE");
        assert_eq!(
            body["profile_path"],
            "/members/r%C9%99%C5%9Fad-%C9%99liyev"
        );

        let fetched = app
            .send_json("GET", "/api/v1/members/r%C9%99%C5%9Fad-%C9%99liyev", Some(&reader), None)
            .await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(read_json(fetched).await["linked_account_is_admin"], false);

        let forbidden = app
            .send_json(
                "PUT",
                &format!("/api/v1/members/{}", id),
                Some(&reader),
                Some(serde_json::json!({"name": "Changed", "status": "ACTIVE"})),
            )
            .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let deleted = app
            .send_json(
                "DELETE",
                &format!("/api/v1/members/{}", id),
                Some(&admin),
                Some(serde_json::json!({"name_confirmation": "Rəşad Əliyev"})),
            )
            .await;
        assert_eq!(deleted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_role_assignment_over_http() {
        let app = TestApp::new().await;
        let (admin, admin_token) = token_for(&app, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let (target, _) = token_for(&app, "new@example.com", RoleSet::empty()).await;

        let assigned = app
            .send_json(
                "PUT",
                &format!("/api/v1/admin/users/{}/roles", target.id),
                Some(&admin_token),
                Some(serde_json::json!({"roles": ["OFFICIAL", "USER"]})),
            )
            .await;
        assert_eq!(assigned.status(), StatusCode::OK);
        let body = read_json(assigned).await;
        assert_eq!(body["user"]["roles"], serde_json::json!(["USER", "OFFICIAL"]));

        let invalid = app
            .send_json(
                "PUT",
                &format!("/api/v1/admin/users/{}/roles", target.id),
                Some(&admin_token),
                Some(serde_json::json!({"roles": ["EMPEROR"]})),
            )
            .await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        for loose in [" admin ", "admin", "Official"] {
            let rejected = app
                .send_json(
                    "PUT",
                    &format!("/api/v1/admin/users/{}/roles", target.id),
                    Some(&admin_token),
                    Some(serde_json::json!({"roles": [loose]})),
                )
                .await;
            assert_eq!(rejected.status(), StatusCode::BAD_REQUEST, "accepted {loose:?}");
        }

        let malformed = app
            .send_json(
                "PUT",
                &format!("/api/v1/admin/users/{}/roles", target.id),
                Some(&admin_token),
                Some(serde_json::json!({"nope": 1})),
            )
            .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let own = app
            .send_json(
                "PUT",
                &format!("/api/v1/admin/users/{}/roles", admin.id),
                Some(&admin_token),
                Some(serde_json::json!({"roles": []})),
            )
            .await;
        assert_eq!(own.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(own).await["error"]["message"], "Cannot change your own roles");

        let pending_only = app
            .send_json("GET", "/api/v1/admin/users?role=none", Some(&admin_token), None)
            .await;
        assert_eq!(pending_only.status(), StatusCode::OK);
        assert!(read_json(pending_only).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_manage_users() {
        let app = TestApp::new().await;
        let (_, token) = token_for(&app, "mod@example.com", RoleSet::from([Role::Moderator])).await;
        let (target, _) = token_for(&app, "target@example.com", RoleSet::from([Role::User])).await;

        let listing = app.send_json("GET", "/api/v1/admin/users", Some(&token), None).await;
        assert_eq!(listing.status(), StatusCode::FORBIDDEN);

        let unlinked = app.send_json("GET", "/api/v1/users", Some(&token), None).await;
        assert_eq!(unlinked.status(), StatusCode::FORBIDDEN);

        let delete = app
            .send_json(
                "DELETE",
                &format!("/api/v1/admin/users/{}", target.id),
                Some(&token),
                Some(serde_json::json!({"email_confirmation": "target@example.com"})),
            )
            .await;
        assert_eq!(delete.status(), StatusCode::FORBIDDEN);

        // Authorization is decided before the body is looked at
        for body in [
            serde_json::json!({"roles": ["SUPERUSER"]}),
            serde_json::json!({"nope": 1}),
            serde_json::json!({"roles": ["USER"]}),
        ] {
            let assign = app
                .send_json(
                    "PUT",
                    &format!("/api/v1/admin/users/{}/roles", target.id),
                    Some(&token),
                    Some(body),
                )
                .await;
            assert_eq!(assign.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = TestApp::new().await;
        let (_, token) = token_for(&app, "user@example.com", RoleSet::from([Role::User])).await;

        let response = app.send_json("POST", "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        let me = app.send_json("GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    }
}
