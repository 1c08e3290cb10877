/// Travel Blog Service Library
///
/// Account handling, a shared feed of travel posts with images, likes and
/// comments, a region tag index, and per-user blog management.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: posts, comments, regions, identities
/// - `services`: feed controller and tag indexer
/// - `store`: document store trait with in-memory and Postgres backends
/// - `storage`: object storage trait with in-memory and S3 backends
/// - `auth`: sessions, password hashing and the local auth provider
/// - `middleware`: bearer-token route guard
/// - `error`: error types and handling
/// - `config`: configuration management
/// - `metrics`: Prometheus collectors
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};

use crate::auth::{AuthProvider, LocalAuthProvider};
use crate::middleware::AuthMiddleware;
use crate::services::FeedController;
use crate::storage::ObjectStorage;
use crate::store::DocumentStore;
use actix_web::web;
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct AppState {
    pub feed: Arc<FeedController>,
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    /// Wire the feed controller and local auth provider over the given backends.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        config: &Config,
    ) -> Self {
        let auth = LocalAuthProvider::new(
            store.clone(),
            &config.auth.jwt_secret,
            chrono::Duration::seconds(config.auth.session_ttl_secs),
        );
        let feed = FeedController::new(store.clone(), storage.clone(), config.feed.max_image_bytes);

        Self {
            feed: Arc::new(feed),
            auth: Arc::new(auth),
            store,
            storage,
        }
    }
}

/// Register every route. Sign-in, sign-up, media, health and metrics are
/// public; the rest of `/api/v1` sits behind `AuthMiddleware`.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        // Sign-up may carry the profile photo as a data URL.
        let json_limit = state.feed.max_image_bytes() * 2;

        cfg.app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(json_limit))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/health", web::get().to(handlers::health))
            .route("/health/live", web::get().to(handlers::liveness))
            .route("/api/v1/auth/sign-up", web::post().to(handlers::sign_up))
            .route("/api/v1/auth/sign-in", web::post().to(handlers::sign_in))
            .route("/api/v1/media/{key:.*}", web::get().to(handlers::get_media))
            .service(
                web::scope("/api/v1")
                    .wrap(AuthMiddleware::new(state.auth.clone()))
                    .route("/auth/sign-out", web::post().to(handlers::sign_out))
                    .route("/auth/me", web::get().to(handlers::me))
                    .route("/feed", web::get().to(handlers::get_feed))
                    .route("/my-posts", web::get().to(handlers::my_posts))
                    .route("/tags/{region}", web::get().to(handlers::get_tag))
                    .service(
                        web::scope("/posts")
                            .service(web::resource("").route(web::post().to(handlers::create_post)))
                            .service(
                                web::resource("/{id}").route(web::delete().to(handlers::delete_post)),
                            )
                            .route("/{id}/like", web::post().to(handlers::like_post))
                            .route("/{id}/comments", web::post().to(handlers::add_comment)),
                    ),
            );
    }
}
