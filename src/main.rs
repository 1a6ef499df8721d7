use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vote_engine::config::Config;
use vote_engine::database::{create_pool, run_migrations};
use vote_engine::redis::RedisClient;
use vote_engine::services::aggregate_maintainer::AggregateMaintainer;
use vote_engine::services::change_listener::ChangeListener;
use vote_engine::store::PgVoteStore;
use vote_engine::{AppState, create_app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vote_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let db = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&db).await?;
    tracing::info!("Database migrations completed");

    // Create Redis client
    let redis = Arc::new(RedisClient::new(&config.redis_url).await?);
    tracing::info!("Redis client created");

    let store = Arc::new(PgVoteStore::new(db.clone()));

    // Reactive counter maintenance for writes that bypass the vote endpoint
    if config.engine.reactive_maintainer_enabled {
        let maintainer = AggregateMaintainer::new(store.clone(), config.engine.clone());
        ChangeListener::new(db, config.engine.interaction_channel.clone(), maintainer).start();
        tracing::info!("Reactive aggregate maintainer started");
    }

    // Create application state
    let state = AppState::new(store, redis, Arc::new(config.clone()));

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server listening on {}:{}", config.host, config.port);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
