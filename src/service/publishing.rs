//! Publishing service
//!
//! Chapter creation, version history and the publication lifecycle.
//! Every command loads the chapter aggregate inside one transaction,
//! applies the domain operation and saves the head with an optimistic
//! `row_version` check.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::SqliteConnection;

use crate::data::{Database, Series, store};
use crate::domain::{
    Chapter, ChapterVersion, DomainEvent, GuardedAction, Outcome, ReportTarget, ScanInput,
    SeriesKind, VersionDraft, VersionStatus,
};
use crate::error::AppError;
use crate::metrics::{
    CHAPTERS_PUBLISHED_TOTAL, CHAPTERS_UNPUBLISHED_TOTAL, ORDERING_OPERATIONS_TOTAL,
    VERSIONS_CREATED_TOTAL,
};
use crate::service::restriction;

/// Load a chapter and check that `actor_id` owns its series
pub(crate) async fn load_owned_chapter(
    conn: &mut SqliteConnection,
    actor_id: i64,
    chapter_id: i64,
) -> Result<(Series, Chapter), AppError> {
    let chapter = store::get_chapter(conn, chapter_id).await?;
    let series = store::get_series_for_volume(conn, chapter.volume_id).await?;
    if series.owner_id != actor_id {
        return Err(AppError::Forbidden);
    }
    Ok((series, chapter))
}

fn check_kind(series: &Series, draft: &VersionDraft) -> Result<(), AppError> {
    let kind = SeriesKind::parse(&series.kind)?;
    if !kind.accepts(&draft.content) {
        return Err(AppError::Validation(format!(
            "{} series cannot hold this kind of chapter content",
            kind.as_str()
        )));
    }
    Ok(())
}

fn version_kind(draft: &VersionDraft) -> &'static str {
    if draft.is_auto_save { "auto_save" } else { "draft" }
}

/// Publishing service
pub struct PublishingService {
    db: Arc<Database>,
    label_offset: FixedOffset,
}

impl PublishingService {
    /// Create new publishing service
    ///
    /// # Arguments
    /// * `label_offset` - Offset used to render version labels
    pub fn new(db: Arc<Database>, label_offset: FixedOffset) -> Self {
        Self { db, label_offset }
    }

    /// Create a chapter at the end of a volume with its first version
    pub async fn create_chapter(
        &self,
        actor_id: i64,
        volume_id: i64,
        draft: VersionDraft,
        price: Option<i64>,
    ) -> Result<Chapter, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let series = store::get_series_for_volume(&mut tx, volume_id).await?;
        if series.owner_id != actor_id {
            return Err(AppError::Forbidden);
        }
        check_kind(&series, &draft)?;

        let volume = store::get_volume(&mut tx, volume_id).await?;
        let mut sequence = store::get_chapter_sequence(&mut tx, volume_id).await?;
        let kind = version_kind(&draft);

        let first = ChapterVersion::from_draft(draft, now, self.label_offset)?;
        let mut chapter = Chapter::start(volume_id, first, price)?;
        chapter.chapter_number = sequence.count() + 1;
        chapter.id = store::insert_chapter(&mut tx, &chapter).await?;
        let number = sequence.append(chapter.id)?;
        debug_assert_eq!(number, chapter.chapter_number);
        store::update_volume_counter(&mut tx, &volume, sequence.count()).await?;

        tx.commit().await?;

        VERSIONS_CREATED_TOTAL.with_label_values(&[kind]).inc();
        ORDERING_OPERATIONS_TOTAL
            .with_label_values(&["chapter", "append"])
            .inc();
        tracing::info!(
            chapter_id = chapter.id,
            volume_id,
            chapter_number = chapter.chapter_number,
            "Chapter created"
        );

        Ok(chapter)
    }

    /// Chapter with its full history (owner only)
    pub async fn get_chapter(&self, actor_id: i64, chapter_id: i64) -> Result<Chapter, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        let (_, chapter) = load_owned_chapter(&mut conn, actor_id, chapter_id).await?;
        Ok(chapter)
    }

    /// Save, update or auto-save: appends a version and makes it current
    pub async fn save_version(
        &self,
        actor_id: i64,
        chapter_id: i64,
        draft: VersionDraft,
    ) -> Result<ChapterVersion, AppError> {
        let now = Utc::now();
        let kind = version_kind(&draft);
        let mut tx = self.db.begin().await?;

        let (series, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        check_kind(&series, &draft)?;
        let version = chapter
            .create_version(draft, now, self.label_offset)?
            .clone();
        store::insert_version(&mut tx, chapter_id, &version).await?;
        store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;

        VERSIONS_CREATED_TOTAL.with_label_values(&[kind]).inc();
        tracing::debug!(chapter_id, version_id = %version.id, kind, "Version saved");

        Ok(version)
    }

    pub async fn rename_version(
        &self,
        actor_id: i64,
        chapter_id: i64,
        version_id: &str,
        label: &str,
    ) -> Result<ChapterVersion, AppError> {
        let mut tx = self.db.begin().await?;

        let (_, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        chapter.rename_version(version_id, label)?;
        let version = chapter.version(version_id).cloned().ok_or(AppError::NotFound)?;
        store::update_version_label(&mut tx, version_id, &version.label).await?;
        store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;
        Ok(version)
    }

    /// Make an older version current again
    pub async fn restore_version(
        &self,
        actor_id: i64,
        chapter_id: i64,
        version_id: &str,
    ) -> Result<Chapter, AppError> {
        let mut tx = self.db.begin().await?;

        let (_, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        chapter.restore_version(version_id, Utc::now())?;
        chapter.row_version = store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;

        tracing::info!(chapter_id, version_id, "Version restored");
        Ok(chapter)
    }

    pub async fn remove_version(
        &self,
        actor_id: i64,
        chapter_id: i64,
        version_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let (_, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        chapter.remove_version(version_id)?;
        store::delete_version(&mut tx, version_id).await?;
        store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;

        tracing::info!(chapter_id, version_id, "Version removed");
        Ok(())
    }

    /// Publish the current version now, or schedule it for `scheduled_at`.
    ///
    /// The version bound is whatever is current when this is called; edits
    /// made later are not picked up by a pending schedule.
    pub async fn publish(
        &self,
        actor_id: i64,
        chapter_id: i64,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Outcome<Chapter>, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let (_, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        restriction::guard(&mut tx, actor_id, GuardedAction::PublishChapter, now).await?;

        let change = match scheduled_at {
            Some(at) => chapter.schedule_publish(at, now)?,
            None => chapter.publish_now(now)?,
        };
        if let Some(demoted) = &change.demoted_version_id {
            store::update_version_status(&mut tx, demoted, VersionStatus::Draft).await?;
        }
        store::update_version_status(&mut tx, &change.published_version_id, VersionStatus::Published)
            .await?;
        chapter.row_version = store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;

        let mode = if scheduled_at.is_some() { "scheduled" } else { "immediate" };
        CHAPTERS_PUBLISHED_TOTAL.with_label_values(&[mode]).inc();
        tracing::info!(
            chapter_id,
            version_id = %change.published_version_id,
            published_at = %change.published_at,
            mode,
            "Chapter published"
        );

        let input = chapter
            .published_version()
            .map(|version| {
                ScanInput::from_chapter(&version.title, version.note.as_deref(), &version.content)
            })
            .ok_or(AppError::NotFound)?;
        Ok(Outcome::new(chapter)
            .with_event(DomainEvent::ChapterPublished {
                chapter_id,
                version_id: change.published_version_id,
                published_at: change.published_at,
            })
            .with_event(DomainEvent::ContentCommitted {
                target: ReportTarget::Content(chapter_id),
                input,
            }))
    }

    pub async fn unpublish(&self, actor_id: i64, chapter_id: i64) -> Result<Outcome<Chapter>, AppError> {
        let mut tx = self.db.begin().await?;

        let (_, mut chapter) = load_owned_chapter(&mut tx, actor_id, chapter_id).await?;
        let version_id = chapter.unpublish(Utc::now())?;
        store::update_version_status(&mut tx, &version_id, VersionStatus::Draft).await?;
        chapter.row_version = store::update_chapter(&mut tx, &chapter).await?;

        tx.commit().await?;

        CHAPTERS_UNPUBLISHED_TOTAL.inc();
        tracing::info!(chapter_id, version_id = %version_id, "Chapter unpublished");

        Ok(Outcome::new(chapter).with_event(DomainEvent::ChapterUnpublished {
            chapter_id,
            version_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChapterContent, PublicationState};
    use crate::service::{CatalogService, RestrictionService};
    use chrono::Duration;
    use tempfile::TempDir;

    struct Fixture {
        db: Arc<Database>,
        service: PublishingService,
        author_id: i64,
        volume_id: i64,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-publishing.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let author = db.create_user("author", false).await.unwrap();

        let catalog = CatalogService::new(db.clone());
        let series = catalog
            .create_series(author.id, "Moonlit", None, SeriesKind::Novel)
            .await
            .unwrap()
            .value;
        let volume = catalog
            .create_volume(author.id, series.id, "Volume 1")
            .await
            .unwrap();

        Fixture {
            service: PublishingService::new(db.clone(), FixedOffset::east_opt(0).unwrap()),
            db,
            author_id: author.id,
            volume_id: volume.id,
            _temp_dir: temp_dir,
        }
    }

    fn draft(title: &str) -> VersionDraft {
        VersionDraft {
            title: title.to_string(),
            thumbnail: None,
            content: ChapterContent::Novel {
                html: format!("<p>{title}</p>"),
            },
            note: None,
            is_auto_save: false,
        }
    }

    #[tokio::test]
    async fn chapters_are_numbered_densely() {
        let f = fixture().await;
        for n in 1..=3 {
            let chapter = f
                .service
                .create_chapter(f.author_id, f.volume_id, draft(&format!("C{n}")), None)
                .await
                .unwrap();
            assert_eq!(chapter.chapter_number, n);
        }
        let volume = f.db.get_volume(f.volume_id).await.unwrap().unwrap();
        assert_eq!(volume.chapter_count, 3);
    }

    #[tokio::test]
    async fn comic_content_is_rejected_in_novel_series() {
        let f = fixture().await;
        let mut input = draft("C1");
        input.content = ChapterContent::Comic {
            images: vec!["p1.webp".to_string()],
        };
        let result = f
            .service
            .create_chapter(f.author_id, f.volume_id, input, None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn other_users_cannot_edit() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();
        let stranger = f.db.create_user("stranger", false).await.unwrap();

        assert!(matches!(
            f.service.save_version(stranger.id, chapter.id, draft("x")).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.service.publish(stranger.id, chapter.id, None).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn publish_unpublish_cycle_persists() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();

        let outcome = f.service.publish(f.author_id, chapter.id, None).await.unwrap();
        assert_eq!(outcome.scan_targets().count(), 1);
        assert!(matches!(
            f.service.publish(f.author_id, chapter.id, None).await,
            Err(AppError::AlreadyPublished)
        ));

        let stored = f.service.get_chapter(f.author_id, chapter.id).await.unwrap();
        assert_eq!(stored.publication_state(Utc::now()), PublicationState::Published);
        assert_eq!(stored.current_version().unwrap().status, VersionStatus::Published);

        f.service.unpublish(f.author_id, chapter.id).await.unwrap();
        let stored = f.service.get_chapter(f.author_id, chapter.id).await.unwrap();
        assert_eq!(stored.publication_state(Utc::now()), PublicationState::Unpublished);
        assert!(stored.versions.iter().all(|v| v.status == VersionStatus::Draft));
        assert!(matches!(
            f.service.unpublish(f.author_id, chapter.id).await,
            Err(AppError::NotPublished)
        ));
    }

    #[tokio::test]
    async fn edits_keep_published_snapshot_until_republished() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();
        let first = chapter.current_version_id.clone();
        f.service.publish(f.author_id, chapter.id, None).await.unwrap();

        let second = f
            .service
            .save_version(f.author_id, chapter.id, draft("C1 revised"))
            .await
            .unwrap();
        let stored = f.service.get_chapter(f.author_id, chapter.id).await.unwrap();
        assert_eq!(stored.published_version_id.as_deref(), Some(first.as_str()));
        assert_eq!(stored.current_version_id, second.id);

        f.service.publish(f.author_id, chapter.id, None).await.unwrap();
        let stored = f.service.get_chapter(f.author_id, chapter.id).await.unwrap();
        assert_eq!(stored.published_version_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(stored.version(&first).unwrap().status, VersionStatus::Draft);
    }

    #[tokio::test]
    async fn version_in_use_cannot_be_removed() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();
        let first = chapter.current_version_id.clone();

        assert!(matches!(
            f.service.remove_version(f.author_id, chapter.id, &first).await,
            Err(AppError::Conflict(_))
        ));

        f.service
            .save_version(f.author_id, chapter.id, draft("C1 v2"))
            .await
            .unwrap();
        f.service
            .rename_version(f.author_id, chapter.id, &first, "First pass")
            .await
            .unwrap();
        f.service
            .remove_version(f.author_id, chapter.id, &first)
            .await
            .unwrap();
        let stored = f.service.get_chapter(f.author_id, chapter.id).await.unwrap();
        assert_eq!(stored.versions.len(), 1);
        assert!(matches!(
            f.service.restore_version(f.author_id, chapter.id, &first).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn schedule_validates_date() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();

        let past = Utc::now() - Duration::hours(1);
        assert!(matches!(
            f.service.publish(f.author_id, chapter.id, Some(past)).await,
            Err(AppError::InvalidDate(_))
        ));

        let future = Utc::now() + Duration::days(2);
        let outcome = f
            .service
            .publish(f.author_id, chapter.id, Some(future))
            .await
            .unwrap();
        assert_eq!(
            outcome.value.publication_state(Utc::now()),
            PublicationState::Scheduled
        );
    }

    #[tokio::test]
    async fn publish_restriction_blocks_publish() {
        let f = fixture().await;
        let chapter = f
            .service
            .create_chapter(f.author_id, f.volume_id, draft("C1"), None)
            .await
            .unwrap();
        RestrictionService::new(f.db.clone())
            .restrict_publish(f.author_id, Utc::now() + Duration::days(7))
            .await
            .unwrap();

        assert!(matches!(
            f.service.publish(f.author_id, chapter.id, None).await,
            Err(AppError::Restricted { .. })
        ));
        // Drafting is still allowed
        f.service
            .save_version(f.author_id, chapter.id, draft("C1 v2"))
            .await
            .unwrap();
    }
}
