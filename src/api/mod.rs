//! API layer
//!
//! HTTP handlers for:
//! - Authoring (series, volumes, chapters, versions)
//! - Reading and community (chapters, comments, reviews, reports)
//! - Moderation (report ledger, restrictions)
//! - Metrics (Prometheus)

mod authoring;
pub mod dto;
pub mod metrics;
mod moderation;
mod reader;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::AppState;

pub use metrics::metrics_router;

/// Create the `/api` router
pub fn api_router() -> Router<AppState> {
    let authoring_routes = Router::new()
        .route("/series", post(authoring::create_series))
        .route("/series/:id", patch(authoring::update_series))
        .route("/series/:id/volumes", post(authoring::create_volume))
        .route("/volumes/:id", delete(authoring::remove_volume))
        .route("/volumes/:id/reorder", post(authoring::reorder_volume))
        .route(
            "/volumes/:id/chapters",
            get(reader::list_chapters).post(authoring::create_chapter),
        )
        .route(
            "/chapters/:id",
            get(reader::read_chapter).delete(authoring::remove_chapter),
        )
        .route("/chapters/:id/reorder", post(authoring::reorder_chapter))
        .route("/chapters/:id/publish", post(authoring::publish_chapter))
        .route("/chapters/:id/unpublish", post(authoring::unpublish_chapter))
        .route(
            "/chapters/:id/versions",
            get(authoring::list_versions).post(authoring::save_version),
        )
        .route(
            "/chapters/:id/versions/:version_id",
            patch(authoring::rename_version).delete(authoring::remove_version),
        )
        .route(
            "/chapters/:id/versions/:version_id/restore",
            post(authoring::restore_version),
        );

    let community_routes = Router::new()
        .route("/chapters/:id/comments", post(reader::post_comment))
        .route("/series/:id/reviews", post(reader::post_review))
        .route("/reports", post(reader::file_report))
        .route("/me/restrictions", get(reader::my_restrictions));

    let moderation_routes = Router::new()
        .route("/reports", get(moderation::list_reports))
        .route("/reports/:type/:id", get(moderation::get_entry))
        .route("/reports/:type/:id/dismiss", post(moderation::dismiss_entry))
        .route("/reports/:type/:id/resolve", post(moderation::resolve_entry))
        .route(
            "/users/:id/restrictions/:kind",
            delete(moderation::lift_restriction),
        );

    Router::new()
        .merge(authoring_routes)
        .merge(community_routes)
        .nest("/moderation", moderation_routes)
}
