//! Moderation endpoints
//!
//! Every handler takes the [`Moderator`] extractor, so non-moderators get
//! `403 Forbidden` before any work is done.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::dto::{LedgerEntryResponse, LedgerPageResponse, LedgerParams, ResolveRequest, TransitionResponse};
use crate::AppState;
use crate::auth::Moderator;
use crate::domain::{ReportStatus, ReportTarget, RestrictionKind, TargetType};
use crate::error::AppError;
use crate::service::{LedgerQuery, ModerationService, RestrictionService};

fn target_from_path(target_type: &str, target_id: &str) -> Result<ReportTarget, AppError> {
    ReportTarget::parse(TargetType::parse(target_type)?, target_id)
}

/// GET /api/moderation/reports
pub async fn list_reports(
    State(state): State<AppState>,
    Moderator(_moderator): Moderator,
    Query(params): Query<LedgerParams>,
) -> Result<Json<LedgerPageResponse>, AppError> {
    let query = LedgerQuery {
        status: params.status.as_deref().map(ReportStatus::parse).transpose()?,
        target_type: params
            .target_type
            .as_deref()
            .map(TargetType::parse)
            .transpose()?,
        page: params.page,
        limit: params.limit,
    };
    let page = ModerationService::new(state.db.clone())
        .list_entries(&query)
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/moderation/reports/:type/:id
pub async fn get_entry(
    State(state): State<AppState>,
    Moderator(_moderator): Moderator,
    Path((target_type, target_id)): Path<(String, String)>,
) -> Result<Json<LedgerEntryResponse>, AppError> {
    let target = target_from_path(&target_type, &target_id)?;
    let entry = ModerationService::new(state.db.clone()).entry(target).await?;
    Ok(Json(entry.into()))
}

/// POST /api/moderation/reports/:type/:id/dismiss
pub async fn dismiss_entry(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    Path((target_type, target_id)): Path<(String, String)>,
) -> Result<Json<TransitionResponse>, AppError> {
    let target = target_from_path(&target_type, &target_id)?;
    let outcome = ModerationService::new(state.db.clone())
        .dismiss(target)
        .await?;
    tracing::info!(moderator_id = moderator.id, report_target = %target, "Moderator dismissed entry");
    state.dispatcher.dispatch(outcome.events);
    Ok(Json(TransitionResponse {
        affected: outcome.value,
        restriction: None,
    }))
}

/// POST /api/moderation/reports/:type/:id/resolve
pub async fn resolve_entry(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    Path((target_type, target_id)): Path<(String, String)>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let target = target_from_path(&target_type, &target_id)?;
    let outcome = ModerationService::new(state.db.clone())
        .resolve(target, request.restriction_days)
        .await?;
    tracing::info!(moderator_id = moderator.id, report_target = %target, "Moderator resolved entry");
    state.dispatcher.dispatch(outcome.events);
    Ok(Json(outcome.value.into()))
}

/// DELETE /api/moderation/users/:id/restrictions/:kind
pub async fn lift_restriction(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    Path((user_id, kind)): Path<(i64, String)>,
) -> Result<StatusCode, AppError> {
    let kind = RestrictionKind::parse(&kind)?;
    RestrictionService::new(state.db.clone())
        .lift(user_id, kind)
        .await?;
    tracing::info!(moderator_id = moderator.id, user_id, kind = kind.as_str(), "Restriction lifted");
    Ok(StatusCode::NO_CONTENT)
}
