//! Quillpress - serialized fiction publishing core
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Authoring, reader and moderation endpoints               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Transactions, restriction guards                         │
//! │  - Post-commit moderation pipeline                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │         Domain               │ │        Data Layer          │
//! │  - Versions, ordering,       │ │  - SQLite (sqlx)           │
//! │    reports, restrictions     │ │                            │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `domain`: Pure domain rules
//! - `data`: Database layer
//! - `auth`: Session tokens and extractors
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use service::{
    ContentClassifier, ContentSafetyGate, EventDispatcher, ModerationPipeline, ModerationService,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Post-commit event handling (content scans)
    pub dispatcher: EventDispatcher,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Select the content classifier
    /// 3. Wire the moderation pipeline
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let classifier = service::classifier_from_config(&config.moderation)?;
        let state = Self::with_classifier(config, classifier).await?;

        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Initialize application state around an explicit classifier
    pub async fn with_classifier(
        config: config::AppConfig,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Result<Self, error::AppError> {
        let db = Arc::new(data::Database::connect_with_config(&config.database).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let gate = ContentSafetyGate::new(
            classifier,
            Duration::from_millis(config.moderation.timeout_ms),
        );
        let pipeline = ModerationPipeline::new(gate, ModerationService::new(db.clone()));

        Ok(Self {
            config: Arc::new(config),
            db,
            dispatcher: EventDispatcher::new(pipeline),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(axum::middleware::from_fn(api::metrics::track_requests))
        .with_state(state)
        .merge(api::metrics_router())
}

/// Largest accepted request body; fits a maximum-size novel chapter as JSON
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
