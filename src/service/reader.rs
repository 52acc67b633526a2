//! Reader service
//!
//! Read-side of the catalog. Scheduled publication has no timer: whether a
//! chapter is visible is decided here, against the clock, on every read.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::data::{ChapterRow, Database, Series, User};
use crate::domain::{ChapterVersion, PublicationState};
use crate::error::AppError;

/// A chapter as shown in a volume's table of contents
#[derive(Debug, Clone)]
pub struct ChapterListing {
    pub chapter: ChapterRow,
    pub state: PublicationState,
}

/// A chapter opened for reading
#[derive(Debug, Clone)]
pub struct ReadableChapter {
    pub chapter: ChapterRow,
    pub state: PublicationState,
    pub version: ChapterVersion,
    pub view_count: i64,
}

fn publication_state(chapter: &ChapterRow, now: DateTime<Utc>) -> PublicationState {
    PublicationState::derive(
        chapter.published_version_id.is_some(),
        chapter.published_at,
        now,
    )
}

/// Reader service
pub struct ReaderService {
    db: Arc<Database>,
}

impl ReaderService {
    /// Create new reader service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Owners and readers with an active entitlement see advance chapters
    async fn is_entitled(&self, viewer: Option<&User>, series: &Series) -> Result<bool, AppError> {
        let Some(viewer) = viewer else {
            return Ok(false);
        };
        if viewer.id == series.owner_id {
            return Ok(true);
        }
        Ok(self
            .db
            .get_entitlement(viewer.id, series.id)
            .await?
            .is_some_and(|entitlement| entitlement.is_active(Utc::now())))
    }

    /// Entitlement only matters for advance chapters, so other states skip
    /// the lookup.
    async fn is_entitled_to_chapter(
        &self,
        viewer: Option<&User>,
        chapter_id: i64,
        state: PublicationState,
    ) -> Result<bool, AppError> {
        if state != PublicationState::Scheduled {
            return Ok(false);
        }
        match self.db.get_series_for_chapter(chapter_id).await? {
            Some(series) => self.is_entitled(viewer, &series).await,
            None => Ok(false),
        }
    }

    /// Visible chapters of a volume, in reading order
    pub async fn list_chapters(
        &self,
        viewer: Option<&User>,
        volume_id: i64,
    ) -> Result<Vec<ChapterListing>, AppError> {
        let volume = self.db.get_volume(volume_id).await?.ok_or(AppError::NotFound)?;
        let series = self
            .db
            .get_series(volume.series_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let entitled = self.is_entitled(viewer, &series).await?;
        let now = Utc::now();

        let chapters = self
            .db
            .list_chapters(volume_id)
            .await?
            .into_iter()
            .map(|chapter| ChapterListing {
                state: publication_state(&chapter, now),
                chapter,
            })
            .filter(|listing| listing.state.is_visible_to(entitled))
            .collect();

        Ok(chapters)
    }

    /// Open the published version of a chapter and count the read.
    ///
    /// Hidden chapters are reported as `NotFound`.
    pub async fn read_chapter(
        &self,
        viewer: Option<&User>,
        chapter_id: i64,
    ) -> Result<ReadableChapter, AppError> {
        let chapter = self.db.get_chapter(chapter_id).await?.ok_or(AppError::NotFound)?;
        let now = Utc::now();
        let state = publication_state(&chapter, now);
        let entitled = self.is_entitled_to_chapter(viewer, chapter_id, state).await?;
        if !state.is_visible_to(entitled) {
            return Err(AppError::NotFound);
        }

        let version_id = chapter
            .published_version_id
            .as_deref()
            .ok_or(AppError::NotFound)?;
        let version: ChapterVersion = self
            .db
            .get_chapter_version(version_id)
            .await?
            .ok_or(AppError::NotFound)?
            .try_into()?;

        self.db.record_view(chapter_id, now.date_naive()).await?;
        let view_count = self.db.get_view_count(chapter_id).await?;

        Ok(ReadableChapter {
            chapter,
            state,
            version,
            view_count,
        })
    }

    /// Whether `viewer` may read chapter `chapter_id` right now
    pub async fn can_read(&self, viewer: Option<&User>, chapter_id: i64) -> Result<bool, AppError> {
        let Some(chapter) = self.db.get_chapter(chapter_id).await? else {
            return Ok(false);
        };
        let state = publication_state(&chapter, Utc::now());
        let entitled = self.is_entitled_to_chapter(viewer, chapter_id, state).await?;
        Ok(state.is_visible_to(entitled))
    }
}
