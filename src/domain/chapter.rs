//! Chapter aggregate
//!
//! A chapter owns its ordered version history. Exactly one version is
//! *current* (the one being edited) and at most one is *published*.
//! Versions are immutable snapshots apart from their label and their
//! draft/published flag.
//!
//! # Publication states
//!
//! ```text
//!            publish_now()             (published_at <= now)
//! Unpublished ──────────────▶ Published
//!     │  ▲                        │
//!     │  └──── unpublish() ───────┘
//!     │  schedule_publish(t > now)
//!     └──────────────▶ Scheduled ──(clock passes t)──▶ Published
//! ```
//!
//! Publishing binds the version that is current at call time. An edit saved
//! after a publish call, even one before a scheduled date is reached, stays
//! a draft until the chapter is published again.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const TITLE_MAX_CHARS: usize = 255;
pub const NOTE_MAX_CHARS: usize = 2000;
pub const LABEL_MAX_CHARS: usize = 255;
pub const NOVEL_MAX_CHARS: usize = 200_000;
pub const COMIC_MAX_PAGES: usize = 300;
pub const FILE_REF_MAX_CHARS: usize = 1024;

const AUTO_SAVE_PREFIX: &str = "Auto-save";
const DRAFT_PREFIX: &str = "Draft";

/// Generate a new version id (ULID, 26 characters).
pub fn new_version_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Draft/published flag of a single version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Published,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(AppError::Internal(anyhow::anyhow!(
                "unknown version status: {other}"
            ))),
        }
    }
}

/// Version payload: HTML for novels, an ordered page list for comics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChapterContent {
    Novel { html: String },
    Comic { images: Vec<String> },
}

impl ChapterContent {
    fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::Novel { html } => {
                if html.trim().is_empty() {
                    return Err(AppError::Validation(
                        "chapter content cannot be empty".to_string(),
                    ));
                }
                if html.chars().count() > NOVEL_MAX_CHARS {
                    return Err(AppError::Validation(format!(
                        "chapter content must be at most {NOVEL_MAX_CHARS} characters"
                    )));
                }
            }
            Self::Comic { images } => {
                if images.is_empty() || images.len() > COMIC_MAX_PAGES {
                    return Err(AppError::Validation(format!(
                        "comic chapters need between 1 and {COMIC_MAX_PAGES} pages"
                    )));
                }
                for image in images {
                    validate_file_ref(image, "page reference")?;
                }
            }
        }
        Ok(())
    }

    /// Novel HTML is sanitized before it is stored.
    fn sanitized(self) -> Self {
        match self {
            Self::Novel { html } => Self::Novel {
                html: ammonia::clean(&html),
            },
            comic => comic,
        }
    }
}

fn validate_file_ref(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() || value.chars().count() > FILE_REF_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "{field} must be between 1 and {FILE_REF_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

/// Input for a new version (save, update or auto-save)
#[derive(Debug, Clone)]
pub struct VersionDraft {
    pub title: String,
    pub thumbnail: Option<String>,
    pub content: ChapterContent,
    pub note: Option<String>,
    pub is_auto_save: bool,
}

impl VersionDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 || title_len > TITLE_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "title must be between 1 and {TITLE_MAX_CHARS} characters"
            )));
        }
        if let Some(note) = &self.note {
            if note.chars().count() > NOTE_MAX_CHARS {
                return Err(AppError::Validation(format!(
                    "note must be at most {NOTE_MAX_CHARS} characters"
                )));
            }
        }
        if let Some(thumbnail) = &self.thumbnail {
            validate_file_ref(thumbnail, "thumbnail")?;
        }
        self.content.validate()
    }
}

/// Immutable snapshot of a chapter's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterVersion {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub content: ChapterContent,
    pub note: Option<String>,
    pub label: String,
    pub is_auto_save: bool,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
}

impl ChapterVersion {
    /// Validate a draft and turn it into a new Draft-status version.
    pub fn from_draft(
        draft: VersionDraft,
        now: DateTime<Utc>,
        label_offset: FixedOffset,
    ) -> Result<Self, AppError> {
        draft.validate()?;
        Ok(Self {
            id: new_version_id(),
            title: draft.title.trim().to_string(),
            thumbnail: draft.thumbnail,
            content: draft.content.sanitized(),
            note: draft.note.filter(|note| !note.trim().is_empty()),
            label: version_label(draft.is_auto_save, now, label_offset),
            is_auto_save: draft.is_auto_save,
            status: VersionStatus::Draft,
            created_at: now,
        })
    }
}

/// `"Auto-save @ 2026-10-17 14:03"` / `"Draft @ 2026-10-17 14:03"`
pub fn version_label(is_auto_save: bool, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let prefix = if is_auto_save {
        AUTO_SAVE_PREFIX
    } else {
        DRAFT_PREFIX
    };
    format!(
        "{prefix} @ {}",
        now.with_timezone(&offset).format("%Y-%m-%d %H:%M")
    )
}

/// Derived publication state of a chapter at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    Unpublished,
    Scheduled,
    Published,
}

impl PublicationState {
    /// State of a chapter head as stored: pointer present plus publish date.
    pub fn derive(
        has_published_version: bool,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        match published_at {
            Some(at) if has_published_version && at > now => Self::Scheduled,
            Some(_) if has_published_version => Self::Published,
            _ => Self::Unpublished,
        }
    }

    /// Reader visibility: unpublished chapters are hidden from everyone,
    /// advance chapters from readers without an entitlement.
    pub fn is_visible_to(self, entitled: bool) -> bool {
        match self {
            Self::Published => true,
            Self::Scheduled => entitled,
            Self::Unpublished => false,
        }
    }
}

/// What a publish call changed, for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishChange {
    pub published_version_id: String,
    /// Previously published version flipped back to Draft, if any
    pub demoted_version_id: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Chapter aggregate root
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub versions: Vec<ChapterVersion>,
    pub current_version_id: String,
    pub published_version_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub price: Option<i64>,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// Start a chapter from its first version.
    ///
    /// `id` and `chapter_number` are placeholders until the chapter is
    /// stored and ordered inside its volume.
    pub fn start(volume_id: i64, first: ChapterVersion, price: Option<i64>) -> Result<Self, AppError> {
        if matches!(price, Some(p) if p < 0) {
            return Err(AppError::Validation("price cannot be negative".to_string()));
        }
        let now = first.created_at;
        Ok(Self {
            id: 0,
            volume_id,
            chapter_number: 0,
            current_version_id: first.id.clone(),
            versions: vec![first],
            published_version_id: None,
            published_at: None,
            price,
            row_version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn version(&self, id: &str) -> Option<&ChapterVersion> {
        self.versions.iter().find(|version| version.id == id)
    }

    fn version_mut(&mut self, id: &str) -> Result<&mut ChapterVersion, AppError> {
        self.versions
            .iter_mut()
            .find(|version| version.id == id)
            .ok_or(AppError::NotFound)
    }

    pub fn current_version(&self) -> Option<&ChapterVersion> {
        self.version(&self.current_version_id)
    }

    pub fn published_version(&self) -> Option<&ChapterVersion> {
        self.published_version_id
            .as_deref()
            .and_then(|id| self.version(id))
    }

    // =========================================================================
    // Version store
    // =========================================================================

    /// Append a new version and make it current.
    ///
    /// The published pointer is left alone, so readers keep seeing the
    /// published snapshot while the author edits.
    pub fn create_version(
        &mut self,
        draft: VersionDraft,
        now: DateTime<Utc>,
        label_offset: FixedOffset,
    ) -> Result<&ChapterVersion, AppError> {
        let version = ChapterVersion::from_draft(draft, now, label_offset)?;
        self.current_version_id = version.id.clone();
        self.updated_at = now;
        let index = self.versions.len();
        self.versions.push(version);
        Ok(&self.versions[index])
    }

    pub fn rename_version(&mut self, id: &str, label: &str) -> Result<(), AppError> {
        let label = label.trim();
        let label_len = label.chars().count();
        if label_len == 0 || label_len > LABEL_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "label must be between 1 and {LABEL_MAX_CHARS} characters"
            )));
        }
        self.version_mut(id)?.label = label.to_string();
        Ok(())
    }

    /// Make an older version current again. Publication state is unchanged.
    pub fn restore_version(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.version(id).is_none() {
            return Err(AppError::NotFound);
        }
        self.current_version_id = id.to_string();
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_version(&mut self, id: &str) -> Result<ChapterVersion, AppError> {
        let index = self
            .versions
            .iter()
            .position(|version| version.id == id)
            .ok_or(AppError::NotFound)?;
        if self.current_version_id == id || self.published_version_id.as_deref() == Some(id) {
            return Err(AppError::Conflict("version in use".to_string()));
        }
        Ok(self.versions.remove(index))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn publication_state(&self, now: DateTime<Utc>) -> PublicationState {
        PublicationState::derive(self.published_version_id.is_some(), self.published_at, now)
    }


    pub fn publish_now(&mut self, now: DateTime<Utc>) -> Result<PublishChange, AppError> {
        self.publish_at(now, now)
    }

    pub fn schedule_publish(
        &mut self,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PublishChange, AppError> {
        if at <= now {
            return Err(AppError::InvalidDate(
                "scheduled publish date must be in the future".to_string(),
            ));
        }
        self.publish_at(at, now)
    }

    fn publish_at(
        &mut self,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PublishChange, AppError> {
        let current_id = self.current_version_id.clone();
        let current = self.version(&current_id).ok_or(AppError::NotFound)?;
        if current.status == VersionStatus::Published {
            return Err(AppError::AlreadyPublished);
        }

        let demoted_version_id = match self.published_version_id.take() {
            Some(previous) if previous != current_id => {
                if let Ok(version) = self.version_mut(&previous) {
                    version.status = VersionStatus::Draft;
                }
                Some(previous)
            }
            _ => None,
        };

        self.version_mut(&current_id)?.status = VersionStatus::Published;
        self.published_version_id = Some(current_id.clone());
        self.published_at = Some(at);
        self.updated_at = now;

        Ok(PublishChange {
            published_version_id: current_id,
            demoted_version_id,
            published_at: at,
        })
    }

    /// Clear the published pointer and flip that version back to Draft.
    ///
    /// Returns the id of the version that was published.
    pub fn unpublish(&mut self, now: DateTime<Utc>) -> Result<String, AppError> {
        let published_id = self.published_version_id.take().ok_or(AppError::NotPublished)?;
        if let Ok(version) = self.version_mut(&published_id) {
            version.status = VersionStatus::Draft;
        }
        self.published_at = None;
        self.updated_at = now;
        Ok(published_id)
    }
}
