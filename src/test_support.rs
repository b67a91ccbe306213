//! Shared fixtures for router-level tests

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use crate::api::{build_router, AppState};
use crate::config::PortalConfig;
use crate::db::repositories::{
    SqlxContentRepository, SqlxDocumentRepository, SqlxMemberRepository, SqlxSessionRepository,
    SqlxUserRepository, UserRepository,
};
use crate::db::{create_test_pool, migrations};
use crate::models::{RoleSet, Session, User};
use crate::services::email::NoopNotifier;
use crate::services::{
    hash_password, AdminService, DocumentService, MemberService, Notifier, UserService,
};
use crate::web::PageRenderer;

pub const TEST_PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<dyn UserRepository>,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let members = SqlxMemberRepository::boxed(pool.clone());
        let notifier: Arc<dyn Notifier> = Arc::new(NoopNotifier);

        let state = AppState {
            user_service: Arc::new(UserService::new(
                users.clone(),
                SqlxSessionRepository::boxed(pool.clone()),
                members.clone(),
                notifier.clone(),
            )),
            admin_service: Arc::new(AdminService::new(
                users.clone(),
                members.clone(),
                SqlxContentRepository::boxed(pool.clone()),
                notifier.clone(),
            )),
            document_service: Arc::new(DocumentService::new(
                SqlxDocumentRepository::boxed(pool.clone()),
                notifier,
            )),
            member_service: Arc::new(MemberService::new(members, users.clone())),
            pages: Arc::new(PageRenderer::new().expect("templates")),
            portal: Arc::new(PortalConfig::default()),
        };

        Self {
            router: build_router(state.clone(), "http://localhost:3000"),
            state,
            users,
        }
    }

    /// Create an account holding `roles` and open a session for it
    pub async fn account(&self, email: &str, roles: RoleSet) -> (User, Session) {
        let hash = hash_password(TEST_PASSWORD).unwrap();
        let user = self
            .users
            .create(&User::new("Test User".into(), email.into(), hash))
            .await
            .unwrap();
        let user = self.users.update_roles(user.id, &roles).await.unwrap();
        let session = self
            .state
            .user_service
            .login(crate::services::LoginInput {
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .unwrap();
        (user, session)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON request authenticated with a bearer token
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

pub async fn read_body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&read_body(response).await).unwrap()
}
