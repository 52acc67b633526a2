//! Catalog service
//!
//! Series, volumes and the ordering of volumes in a series and chapters in
//! a volume. Each ordering command loads the full sibling set, applies the
//! pure ordering operation and writes back only the slots that moved; the
//! parent's `row_version` check makes the losing concurrent writer fail
//! with `Conflict`.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, Series, Volume, store};
use crate::domain::catalog::{validate_series_title, validate_synopsis, validate_volume_title};
use crate::domain::{DomainEvent, Outcome, ReportTarget, ScanInput, SeriesKind};
use crate::error::AppError;
use crate::metrics::ORDERING_OPERATIONS_TOTAL;

fn count_operation(scope: &str, operation: &str) {
    ORDERING_OPERATIONS_TOTAL
        .with_label_values(&[scope, operation])
        .inc();
}

fn series_scan_input(series: &Series) -> ScanInput {
    match &series.synopsis {
        Some(synopsis) => ScanInput::text(format!("{}\n\n{}", series.title, synopsis)),
        None => ScanInput::text(series.title.clone()),
    }
}

/// Catalog service
pub struct CatalogService {
    db: Arc<Database>,
}

impl CatalogService {
    /// Create new catalog service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Series
    // =========================================================================

    pub async fn create_series(
        &self,
        owner_id: i64,
        title: &str,
        synopsis: Option<&str>,
        kind: SeriesKind,
    ) -> Result<Outcome<Series>, AppError> {
        let title = validate_series_title(title)?;
        let synopsis = validate_synopsis(synopsis)?;

        let mut tx = self.db.begin().await?;
        let series = store::insert_series(
            &mut tx,
            owner_id,
            &title,
            synopsis.as_deref(),
            kind.as_str(),
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(series_id = series.id, owner_id, "Series created");

        let input = series_scan_input(&series);
        let target = ReportTarget::Series(series.id);
        Ok(Outcome::new(series).with_event(DomainEvent::ContentCommitted { target, input }))
    }

    /// Update title and/or synopsis. An empty synopsis clears it.
    pub async fn update_series(
        &self,
        actor_id: i64,
        series_id: i64,
        title: Option<&str>,
        synopsis: Option<&str>,
    ) -> Result<Outcome<Series>, AppError> {
        let mut tx = self.db.begin().await?;

        let mut series = store::get_series(&mut tx, series_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        if let Some(title) = title {
            series.title = validate_series_title(title)?;
        }
        if synopsis.is_some() {
            series.synopsis = validate_synopsis(synopsis)?;
        }
        series.updated_at = Utc::now();
        series.row_version = store::update_series(&mut tx, &series).await?;

        tx.commit().await?;

        tracing::info!(series_id, "Series updated");

        let input = series_scan_input(&series);
        Ok(Outcome::new(series).with_event(DomainEvent::ContentCommitted {
            target: ReportTarget::Series(series_id),
            input,
        }))
    }

    // =========================================================================
    // Volumes in a series
    // =========================================================================

    /// Append a volume at the end of a series
    pub async fn create_volume(
        &self,
        actor_id: i64,
        series_id: i64,
        title: &str,
    ) -> Result<Volume, AppError> {
        let title = validate_volume_title(title)?;
        let mut tx = self.db.begin().await?;

        let mut series = store::get_series(&mut tx, series_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        let mut sequence = store::get_volume_sequence(&mut tx, series_id).await?;
        let number = sequence.count() + 1;
        let volume_id = store::insert_volume(&mut tx, series_id, &title, number, Utc::now()).await?;
        sequence.append(volume_id)?;
        series.volume_count = sequence.count();
        store::update_series(&mut tx, &series).await?;
        let volume = store::get_volume(&mut tx, volume_id).await?;

        tx.commit().await?;

        count_operation("volume", "append");
        tracing::info!(series_id, volume_id, volume_number = number, "Volume created");

        Ok(volume)
    }

    /// Delete a volume (and its chapters) and close the numbering gap
    pub async fn remove_volume(&self, actor_id: i64, volume_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let mut series = store::get_series_for_volume(&mut tx, volume_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        let mut sequence = store::get_volume_sequence(&mut tx, series.id).await?;
        let before = sequence.clone();
        sequence.remove(volume_id)?;

        store::delete_volume(&mut tx, volume_id).await?;
        store::update_volume_numbers(&mut tx, &sequence.changed_since(&before)).await?;
        series.volume_count = sequence.count();
        store::update_series(&mut tx, &series).await?;

        tx.commit().await?;

        count_operation("volume", "remove");
        tracing::info!(series_id = series.id, volume_id, "Volume removed");
        Ok(())
    }

    /// Move a volume after `after` (`FRONT` for the first position)
    pub async fn reorder_volume(
        &self,
        actor_id: i64,
        volume_id: i64,
        after: i64,
    ) -> Result<Vec<Volume>, AppError> {
        let mut tx = self.db.begin().await?;

        let series = store::get_series_for_volume(&mut tx, volume_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        let mut sequence = store::get_volume_sequence(&mut tx, series.id).await?;
        let before = sequence.clone();
        sequence.reorder(volume_id, after)?;

        store::update_volume_numbers(&mut tx, &sequence.changed_since(&before)).await?;
        store::update_series(&mut tx, &series).await?;

        tx.commit().await?;

        count_operation("volume", "reorder");
        tracing::info!(series_id = series.id, volume_id, after, "Volume reordered");

        self.db.list_volumes(series.id).await
    }

    // =========================================================================
    // Chapters in a volume
    // =========================================================================

    /// Delete a chapter with its versions and close the numbering gap
    pub async fn remove_chapter(&self, actor_id: i64, chapter_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let chapter = store::get_chapter(&mut tx, chapter_id).await?;
        let series = store::get_series_for_volume(&mut tx, chapter.volume_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        let volume = store::get_volume(&mut tx, chapter.volume_id).await?;
        let mut sequence = store::get_chapter_sequence(&mut tx, volume.id).await?;
        let before = sequence.clone();
        sequence.remove(chapter_id)?;

        store::delete_chapter(&mut tx, chapter_id).await?;
        store::update_chapter_numbers(&mut tx, &sequence.changed_since(&before)).await?;
        store::update_volume_counter(&mut tx, &volume, sequence.count()).await?;

        tx.commit().await?;

        count_operation("chapter", "remove");
        tracing::info!(volume_id = volume.id, chapter_id, "Chapter removed");
        Ok(())
    }

    /// Move a chapter after `after` (`FRONT` for the first position)
    ///
    /// Returns `(chapter_id, chapter_number)` for the whole volume in order.
    pub async fn reorder_chapter(
        &self,
        actor_id: i64,
        chapter_id: i64,
        after: i64,
    ) -> Result<Vec<(i64, i64)>, AppError> {
        let mut tx = self.db.begin().await?;

        let chapter = store::get_chapter(&mut tx, chapter_id).await?;
        let series = store::get_series_for_volume(&mut tx, chapter.volume_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        let volume = store::get_volume(&mut tx, chapter.volume_id).await?;
        let mut sequence = store::get_chapter_sequence(&mut tx, volume.id).await?;
        let before = sequence.clone();
        sequence.reorder(chapter_id, after)?;

        store::update_chapter_numbers(&mut tx, &sequence.changed_since(&before)).await?;
        store::update_volume_counter(&mut tx, &volume, sequence.count()).await?;

        tx.commit().await?;

        count_operation("chapter", "reorder");
        tracing::info!(volume_id = volume.id, chapter_id, after, "Chapter reordered");

        Ok(sequence
            .slots()
            .into_iter()
            .map(|slot| (slot.id, slot.number))
            .collect())
    }
}
