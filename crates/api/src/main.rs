//! Subscription Service API Server

use std::net::SocketAddr;
use std::sync::Arc;

use subsvc_api::{create_router, AppState, Config};
use subsvc_shared::{create_migration_pool, create_pool, run_migrations};
use subsvc_subscriptions::{
    HttpBucketProvisioner, PgSubscriptionStore, PlanCache, SubscriptionLifecycle,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,subsvc_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Subscription Service API v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        let migration_pool = create_migration_pool(&config.database_url).await?;
        run_migrations(&migration_pool).await?;
        migration_pool.close().await;
    } else {
        tracing::info!("Database migrations skipped (RUN_MIGRATIONS not set)");
    }

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url, config.pool_settings()).await?;
    tracing::info!("Database connection established");

    let store = Arc::new(PgSubscriptionStore::with_timeout(
        pool,
        config.db_statement_timeout,
    ));
    let plans = PlanCache::new(store.clone(), config.plan_cache_ttl);
    let provisioner = Arc::new(HttpBucketProvisioner::new(config.provisioner_config())?);
    tracing::info!(
        bucket_service = %config.bucket_service_url,
        retries = config.bucket_retries,
        "Bucket provisioner initialized"
    );

    let lifecycle = SubscriptionLifecycle::new(store, plans, provisioner);
    let state = AppState::new(lifecycle, &config.jwt_secret);

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
