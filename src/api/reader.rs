//! Reader endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::dto::{
    ChapterListingResponse, CommentRequest, ReadableChapterResponse, ReportRequest,
    ReportResponse, RestrictionsResponse, ReviewRequest,
};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{Comment, Review};
use crate::domain::ReportTarget;
use crate::error::AppError;
use crate::service::{CommunityService, ModerationService, ReaderService, RestrictionService};

/// GET /api/volumes/:id/chapters
pub async fn list_chapters(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(volume_id): Path<i64>,
) -> Result<Json<Vec<ChapterListingResponse>>, AppError> {
    let chapters = ReaderService::new(state.db.clone())
        .list_chapters(viewer.as_ref(), volume_id)
        .await?;
    Ok(Json(
        chapters
            .into_iter()
            .map(ChapterListingResponse::from)
            .collect(),
    ))
}

/// GET /api/chapters/:id
pub async fn read_chapter(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(chapter_id): Path<i64>,
) -> Result<Json<ReadableChapterResponse>, AppError> {
    let chapter = ReaderService::new(state.db.clone())
        .read_chapter(viewer.as_ref(), chapter_id)
        .await?;
    Ok(Json(chapter.into()))
}

/// POST /api/chapters/:id/comments
pub async fn post_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chapter_id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let outcome = CommunityService::new(state.db.clone())
        .post_comment(&user, chapter_id, &request.content)
        .await?;
    state.dispatcher.dispatch(outcome.events);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

/// POST /api/series/:id/reviews
pub async fn post_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(series_id): Path<i64>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let outcome = CommunityService::new(state.db.clone())
        .post_review(&user, series_id, request.rating, &request.content)
        .await?;
    state.dispatcher.dispatch(outcome.events);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

/// POST /api/reports
pub async fn file_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportResponse>), AppError> {
    let target = ReportTarget::from_json(request.target_type, &request.target_id)?;
    let report = ModerationService::new(state.db.clone())
        .file_user_report(user.id, target, &request.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(report.into())))
}

/// GET /api/me/restrictions
pub async fn my_restrictions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RestrictionsResponse>, AppError> {
    let (mute, publish) = RestrictionService::new(state.db.clone())
        .permissions(user.id)
        .await?;
    Ok(Json(RestrictionsResponse { mute, publish }))
}
