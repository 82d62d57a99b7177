use std::sync::Arc;

use academy_portal::{
    AppConfig, AppState, Env, PostgresRepository, ProfileRoleSource, RepositoryState,
    auth::{context::ContextRegistry, guard::GuardSet, provider::HttpIdentityProvider},
    create_router,
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Asynchronous entry point: configuration, logging, database, identity
/// provider, auth core, HTTP server, in that order, fail-fast.
#[tokio::main]
async fn main() {
    // 1. Configuration & environment loading.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, sensible defaults otherwise.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "academy_portal=debug,tower_http=info,axum=trace".into());

    // 3. Structured logging, format selected by environment: pretty for
    // local debugging, JSON for production log aggregation.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database initialization.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Auth core assembly: provider client, role source, per-context
    // registry, one layout guard per protected area.
    let provider = Arc::new(HttpIdentityProvider::new(
        &config.provider_url,
        &config.provider_key,
        &config.jwt_secret,
    ));
    let role_source = Arc::new(ProfileRoleSource::new(repo.clone()));
    let contexts = Arc::new(ContextRegistry::new(provider.clone(), role_source));
    let guards = Arc::new(GuardSet::portal_defaults());

    // 6. Unified state assembly.
    let app_state = AppState {
        repo,
        provider,
        contexts,
        guards,
        config,
    };

    // 7. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
