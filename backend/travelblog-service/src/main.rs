use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travelblog_service::config::{DocumentBackend, StorageBackend};
use travelblog_service::storage::{MemoryObjectStorage, ObjectStorage, S3ObjectStorage};
use travelblog_service::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use travelblog_service::{configure, AppState, Config};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Travel Blog Service
///
/// Serves the blog's JSON API: accounts, the shared post feed with likes and
/// comments, region tags and the "my blogs" view.
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting travelblog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let store: Arc<dyn DocumentStore> = match config.documents.backend {
        DocumentBackend::Memory => {
            tracing::warn!("Using in-memory document store; data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
        DocumentBackend::Postgres => Arc::new(
            PgDocumentStore::connect(&config.documents.url, config.documents.max_connections)
                .await
                .context("Failed to connect to the document database")?,
        ),
    };

    let storage: Arc<dyn ObjectStorage> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryObjectStorage::new(
            config.storage.public_base_url.clone(),
        )),
        StorageBackend::S3 => Arc::new(S3ObjectStorage::from_config(&config.storage).await),
    };
    tracing::info!(
        documents = ?config.documents.backend,
        storage = ?config.storage.backend,
        "backends ready"
    );

    let state = web::Data::new(AppState::new(store, storage, &config));

    match state.feed.fetch_feed().await {
        Ok(posts) => tracing::info!(count = posts.len(), "feed cache warmed"),
        Err(e) => tracing::warn!("Initial feed fetch failed, starting with an empty feed: {}", e),
    }

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server on {}", bind_address);

    let cors_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure(state.clone()))
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .disable_signals()
    .run();

    let handle = server.handle();
    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            handle.stop(true).await;
        }
    }

    tracing::info!("travelblog-service shutting down");
    Ok(())
}
