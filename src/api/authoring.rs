//! Authoring endpoints
//!
//! Series, volumes, chapters and chapter versions of the calling author.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::dto::{
    ChapterResponse, CreateChapterRequest, CreateSeriesRequest, CreateVolumeRequest,
    PositionResponse, PublishRequest, RenameVersionRequest, ReorderRequest, SeriesResponse,
    UpdateSeriesRequest, VersionRequest, VersionSummary, VolumeResponse,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::domain::ChapterVersion;
use crate::error::AppError;
use crate::service::{CatalogService, PublishingService};

fn catalog(state: &AppState) -> CatalogService {
    CatalogService::new(state.db.clone())
}

fn publishing(state: &AppState) -> PublishingService {
    PublishingService::new(state.db.clone(), state.config.publishing.label_offset())
}

// =============================================================================
// Series and volumes
// =============================================================================

/// POST /api/series
pub async fn create_series(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateSeriesRequest>,
) -> Result<(StatusCode, Json<SeriesResponse>), AppError> {
    let outcome = catalog(&state)
        .create_series(user.id, &request.title, request.synopsis.as_deref(), request.kind)
        .await?;
    state.dispatcher.dispatch(outcome.events);
    Ok((StatusCode::CREATED, Json(outcome.value.into())))
}

/// PATCH /api/series/:id
pub async fn update_series(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(series_id): Path<i64>,
    Json(request): Json<UpdateSeriesRequest>,
) -> Result<Json<SeriesResponse>, AppError> {
    let outcome = catalog(&state)
        .update_series(
            user.id,
            series_id,
            request.title.as_deref(),
            request.synopsis.as_deref(),
        )
        .await?;
    state.dispatcher.dispatch(outcome.events);
    Ok(Json(outcome.value.into()))
}

/// POST /api/series/:id/volumes
pub async fn create_volume(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(series_id): Path<i64>,
    Json(request): Json<CreateVolumeRequest>,
) -> Result<(StatusCode, Json<VolumeResponse>), AppError> {
    let volume = catalog(&state)
        .create_volume(user.id, series_id, &request.title)
        .await?;
    Ok((StatusCode::CREATED, Json(volume.into())))
}

/// DELETE /api/volumes/:id
pub async fn remove_volume(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(volume_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog(&state).remove_volume(user.id, volume_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/volumes/:id/reorder
pub async fn reorder_volume(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(volume_id): Path<i64>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<PositionResponse>>, AppError> {
    let volumes = catalog(&state)
        .reorder_volume(user.id, volume_id, request.after())
        .await?;
    Ok(Json(
        volumes
            .into_iter()
            .map(|volume| PositionResponse {
                id: volume.id,
                number: volume.volume_number,
            })
            .collect(),
    ))
}

// =============================================================================
// Chapters
// =============================================================================

/// POST /api/volumes/:id/chapters
pub async fn create_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(volume_id): Path<i64>,
    Json(request): Json<CreateChapterRequest>,
) -> Result<(StatusCode, Json<ChapterResponse>), AppError> {
    let chapter = publishing(&state)
        .create_chapter(user.id, volume_id, request.version.into(), request.price)
        .await?;
    Ok((StatusCode::CREATED, Json(chapter.into())))
}

/// DELETE /api/chapters/:id
pub async fn remove_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog(&state).remove_chapter(user.id, chapter_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/chapters/:id/reorder
pub async fn reorder_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<PositionResponse>>, AppError> {
    let positions = catalog(&state)
        .reorder_chapter(user.id, chapter_id, request.after())
        .await?;
    Ok(Json(
        positions
            .into_iter()
            .map(|(id, number)| PositionResponse { id, number })
            .collect(),
    ))
}

/// POST /api/chapters/:id/publish
///
/// An empty body publishes now; `scheduled_at` schedules an advance release.
pub async fn publish_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
    request: Option<Json<PublishRequest>>,
) -> Result<Json<ChapterResponse>, AppError> {
    let scheduled_at = request.and_then(|Json(request)| request.scheduled_at);
    let outcome = publishing(&state)
        .publish(user.id, chapter_id, scheduled_at)
        .await?;
    state.dispatcher.dispatch(outcome.events);
    Ok(Json(outcome.value.into()))
}

/// POST /api/chapters/:id/unpublish
pub async fn unpublish_chapter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
) -> Result<Json<ChapterResponse>, AppError> {
    let outcome = publishing(&state).unpublish(user.id, chapter_id).await?;
    state.dispatcher.dispatch(outcome.events);
    Ok(Json(outcome.value.into()))
}

// =============================================================================
// Versions
// =============================================================================

/// GET /api/chapters/:id/versions
pub async fn list_versions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
) -> Result<Json<Vec<VersionSummary>>, AppError> {
    let chapter = publishing(&state).get_chapter(user.id, chapter_id).await?;
    Ok(Json(VersionSummary::history(&chapter)))
}

/// POST /api/chapters/:id/versions
pub async fn save_version(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
    Json(request): Json<VersionRequest>,
) -> Result<(StatusCode, Json<ChapterVersion>), AppError> {
    let version = publishing(&state)
        .save_version(user.id, chapter_id, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// PATCH /api/chapters/:id/versions/:version_id
pub async fn rename_version(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((chapter_id, version_id)): Path<(i64, String)>,
    Json(request): Json<RenameVersionRequest>,
) -> Result<Json<ChapterVersion>, AppError> {
    let version = publishing(&state)
        .rename_version(user.id, chapter_id, &version_id, &request.label)
        .await?;
    Ok(Json(version))
}

/// DELETE /api/chapters/:id/versions/:version_id
pub async fn remove_version(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((chapter_id, version_id)): Path<(i64, String)>,
) -> Result<StatusCode, AppError> {
    publishing(&state)
        .remove_version(user.id, chapter_id, &version_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/chapters/:id/versions/:version_id/restore
pub async fn restore_version(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((chapter_id, version_id)): Path<(i64, String)>,
) -> Result<Json<ChapterResponse>, AppError> {
    let chapter = publishing(&state)
        .restore_version(user.id, chapter_id, &version_id)
        .await?;
    Ok(Json(chapter.into()))
}
