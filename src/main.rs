use std::sync::Arc;

use rentals_api::{
    config::Config,
    create_router,
    db::{self, Cache, CacheWriterHandle},
    services::{recommender::GorseRecommender, storage::LocalStorage},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let mut recommender = GorseRecommender::new(&config.gorse_api_url, config.gorse_api_key.clone());
    let mut cache_writer: Option<CacheWriterHandle> = None;

    if let Some(redis_url) = &config.redis_url {
        let client = db::create_redis_client(redis_url)?;
        let (cache, handle) = Cache::new(client).await;
        recommender = recommender.with_cache(cache, config.recommendation_cache_ttl);
        cache_writer = Some(handle);
        tracing::info!(
            ttl = config.recommendation_cache_ttl,
            "Caching recommendation lists in Redis"
        );
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let storage = LocalStorage::new(&config.upload_dir, &config.public_base_url);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, Arc::new(recommender), Arc::new(storage), config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

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
