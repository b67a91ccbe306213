//! Brigada - role-based community portal

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brigada::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxContentRepository, SqlxDocumentRepository, SqlxMemberRepository,
            SqlxSessionRepository, SqlxUserRepository,
        },
    },
    services::{
        notifier_from_config, AdminService, DocumentService, MemberService, UserService,
    },
    web::PageRenderer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brigada=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Brigada portal...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let member_repo = SqlxMemberRepository::boxed(pool.clone());
    let document_repo = SqlxDocumentRepository::boxed(pool.clone());
    let content_repo = SqlxContentRepository::boxed(pool.clone());

    let notifier = notifier_from_config(&config.mail, &config.portal, user_repo.clone());

    // Initialize services
    let user_service = Arc::new(
        UserService::new(
            user_repo.clone(),
            session_repo,
            member_repo.clone(),
            notifier.clone(),
        )
        .with_session_expiration(config.session.expiration_days),
    );
    let admin_service = Arc::new(AdminService::new(
        user_repo.clone(),
        member_repo.clone(),
        content_repo,
        notifier.clone(),
    ));
    let document_service = Arc::new(DocumentService::new(document_repo, notifier));
    let member_service = Arc::new(MemberService::new(member_repo, user_repo));

    let pages = PageRenderer::new()?;
    tracing::info!("Page templates loaded");

    let state = AppState {
        user_service: user_service.clone(),
        admin_service,
        document_service,
        member_service,
        pages: Arc::new(pages),
        portal: Arc::new(config.portal.clone()),
    };

    // Expired session cleanup
    {
        let user_service = user_service.clone();
        let period = tokio::time::Duration::from_secs(config.session.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match user_service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
